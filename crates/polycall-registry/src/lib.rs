// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! FFI Core Registry & Dispatch (C4): registers languages and functions,
//! validates and routes calls to their target bridge, and coordinates
//! the conversion, security, and performance subsystems at the call
//! boundary.

pub mod dispatch;
pub mod function;
pub mod language;
pub mod registry;

pub use dispatch::Dispatcher;
pub use function::FunctionRecord;
pub use language::LanguageRegistration;
pub use registry::Registry;
