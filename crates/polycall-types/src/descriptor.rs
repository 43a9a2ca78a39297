// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::sync::Arc;

use crate::signature::FunctionSignature;
use crate::type_id::CanonicalTypeId;

/// Layout of a single struct field: name (for diagnostics and field
/// lookup), canonical type, and byte offset within the struct.
#[derive(Debug, Clone)]
pub struct FieldDescriptor {
    pub name: String,
    pub type_id: CanonicalTypeId,
    pub offset: usize,
    /// Missing optional fields are zero-initialized on conversion; missing
    /// required fields fail the conversion.
    pub optional: bool,
}

/// Element count of an array type: fixed length, or unbounded (a sentinel
/// for variable-length arrays whose length travels with the value).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArrayLength {
    Fixed(usize),
    Variable,
}

/// The layout of a composite canonical type. Descriptors are immutable
/// once registered with the type registry (§4.1); they are cheaply
/// clonable so callers can hold their own copy without borrowing the
/// registry.
#[derive(Debug, Clone)]
pub enum TypeDescriptor {
    Primitive(CanonicalTypeId),
    Struct {
        total_size: usize,
        alignment: usize,
        fields: Vec<FieldDescriptor>,
    },
    Array {
        element_id: CanonicalTypeId,
        length: ArrayLength,
    },
    Callback {
        signature: Arc<FunctionSignature>,
    },
}

impl TypeDescriptor {
    pub fn kind(&self) -> CanonicalTypeId {
        match self {
            TypeDescriptor::Primitive(id) => *id,
            TypeDescriptor::Struct { .. } => CanonicalTypeId::Struct,
            TypeDescriptor::Array { .. } => CanonicalTypeId::Array,
            TypeDescriptor::Callback { .. } => CanonicalTypeId::Callback,
        }
    }

    pub fn total_size(&self) -> usize {
        match self {
            TypeDescriptor::Primitive(id) => id.intrinsic_size(),
            TypeDescriptor::Struct { total_size, .. } => *total_size,
            TypeDescriptor::Array { .. } | TypeDescriptor::Callback { .. } => 0,
        }
    }

    /// Looks up a struct field by name. `None` for non-struct descriptors
    /// or an unknown field name.
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        match self {
            TypeDescriptor::Struct { fields, .. } => fields.iter().find(|f| f.name == name),
            _ => None,
        }
    }
}
