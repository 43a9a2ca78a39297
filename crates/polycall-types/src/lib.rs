// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Canonical type system shared by every LibPolyCall crate: the closed
//! enumeration of type kinds, type descriptors, canonical values,
//! function signatures, permission bits, isolation levels, and the
//! `PolyCallError` type every fallible operation in the workspace returns.

pub mod descriptor;
pub mod error;
pub mod isolation;
pub mod permission;
pub mod signature;
pub mod type_id;
pub mod value;

pub use descriptor::{ArrayLength, FieldDescriptor, TypeDescriptor};
pub use error::{ConversionErrorKind, NotFoundKind, PolyCallError, Result};
pub use isolation::IsolationLevel;
pub use permission::PermissionBits;
pub use signature::{FunctionSignature, Parameter};
pub use type_id::CanonicalTypeId;
pub use value::{CanonicalValue, CompositeHandle, Ownership, Payload};
