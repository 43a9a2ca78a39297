// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Performance Manager (C5): call tracing, the fingerprint-keyed result
//! cache, and the batched dispatch queue.

pub mod batch;
pub mod cache;
pub mod trace;

pub use batch::{BatchQueue, BatchSubmission};
pub use cache::{fingerprint, PerformanceCache};
pub use trace::{trace_begin, CallTrace};
