// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! Type Registry & Conversion Engine (C1): the canonical type catalogue
//! and the rules that convert a [`polycall_types::CanonicalValue`] from
//! one canonical type to another across a language boundary.

pub mod engine;
pub mod registry;
pub mod rule;

pub use engine::{convert_primitive, convert_struct_fields, ConversionEngine};
pub use registry::{TypeHandle, TypeRegistry};
pub use rule::{ConversionRule, LossyPolicy, TypeKey, ANY_LANGUAGE};
