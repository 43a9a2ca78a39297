// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Bridge Contract (C6): the interface every language adapter
//! implements, plus `NativeBridge`, the in-tree reference adapter used
//! as a real (non-mock) dispatch target in tests.

pub mod contract;
pub mod native;

pub use contract::{BridgeContract, BridgeFaultKind, CalleeHandle, CapabilityFlags, NativeOpaque};
pub use native::{NativeBridge, NativeCallee};
