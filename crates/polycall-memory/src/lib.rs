// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Memory Bridge (C2): pool/region allocation, ownership tracking,
//! cross-language sharing with permissions, reference counting, and GC
//! coordination callbacks.

pub mod bridge;
pub mod region;

pub use bridge::{GcNotifier, MemoryBridge, ReleaseOutcome};
pub use region::{Borrower, MemoryRegion, RegionHandle};
