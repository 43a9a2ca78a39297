// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::sync::Arc;

use crate::descriptor::TypeDescriptor;
use crate::type_id::CanonicalTypeId;

/// Whether a value's payload is owned by the holder or borrowed from
/// someone else. Ownership is never ambiguous: every [`CanonicalValue`]
/// carries exactly one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ownership {
    Owned,
    Borrowed,
}

/// A handle into the memory bridge's region index, paired with the
/// descriptor needed to interpret the bytes at that handle.
#[derive(Debug, Clone)]
pub struct CompositeHandle {
    pub region_handle: u64,
    pub descriptor: Arc<TypeDescriptor>,
}

/// The payload carried by a [`CanonicalValue`]. Primitives are stored
/// by-value; strings/bytes carry ownership explicitly; composites are an
/// opaque handle into the memory bridge.
#[derive(Debug, Clone)]
pub enum Payload {
    Void,
    Bool(bool),
    Char(char),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    /// UTF-8 bytes plus an ownership tag. Borrowed strings reference bytes
    /// owned by someone else further up the call stack.
    String { bytes: Arc<[u8]>, ownership: Ownership },
    Pointer(u64),
    Composite(CompositeHandle),
}

/// The language-neutral representation of a value carried across the
/// FFI boundary: a tagged union of (canonical type id, payload).
#[derive(Debug, Clone)]
pub struct CanonicalValue {
    pub type_id: CanonicalTypeId,
    pub payload: Payload,
}

impl CanonicalValue {
    pub fn void() -> Self {
        Self {
            type_id: CanonicalTypeId::Void,
            payload: Payload::Void,
        }
    }

    pub fn bool(v: bool) -> Self {
        Self {
            type_id: CanonicalTypeId::Bool,
            payload: Payload::Bool(v),
        }
    }

    pub fn i32(v: i32) -> Self {
        Self {
            type_id: CanonicalTypeId::I32,
            payload: Payload::I32(v),
        }
    }

    pub fn i64(v: i64) -> Self {
        Self {
            type_id: CanonicalTypeId::I64,
            payload: Payload::I64(v),
        }
    }

    pub fn u32(v: u32) -> Self {
        Self {
            type_id: CanonicalTypeId::U32,
            payload: Payload::U32(v),
        }
    }

    pub fn u64(v: u64) -> Self {
        Self {
            type_id: CanonicalTypeId::U64,
            payload: Payload::U64(v),
        }
    }

    pub fn f32(v: f32) -> Self {
        Self {
            type_id: CanonicalTypeId::F32,
            payload: Payload::F32(v),
        }
    }

    pub fn f64(v: f64) -> Self {
        Self {
            type_id: CanonicalTypeId::F64,
            payload: Payload::F64(v),
        }
    }

    pub fn owned_string(s: impl Into<String>) -> Self {
        let bytes: Arc<[u8]> = Arc::from(s.into().into_bytes().into_boxed_slice());
        Self {
            type_id: CanonicalTypeId::String,
            payload: Payload::String {
                bytes,
                ownership: Ownership::Owned,
            },
        }
    }

    pub fn borrowed_string(bytes: Arc<[u8]>) -> Self {
        Self {
            type_id: CanonicalTypeId::String,
            payload: Payload::String {
                bytes,
                ownership: Ownership::Borrowed,
            },
        }
    }

    pub fn composite(handle: CompositeHandle) -> Self {
        Self {
            type_id: handle.descriptor.kind(),
            payload: Payload::Composite(handle),
        }
    }

    /// Deterministic byte serialization used as part of a performance
    /// cache fingerprint (§4.5). Composite handles serialize by value
    /// identity (the region handle), never by their contents, so mutable
    /// shared-region arguments are excluded from caching by construction
    /// (equal handles collapse to the same bytes only when the handle is
    /// itself the identity).
    pub fn fingerprint_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.push(self.type_id as u8);
        match &self.payload {
            Payload::Void => {}
            Payload::Bool(v) => out.push(*v as u8),
            Payload::Char(v) => out.extend_from_slice(&(*v as u32).to_le_bytes()),
            Payload::I8(v) => out.extend_from_slice(&v.to_le_bytes()),
            Payload::I16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Payload::I32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Payload::I64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Payload::U8(v) => out.extend_from_slice(&v.to_le_bytes()),
            Payload::U16(v) => out.extend_from_slice(&v.to_le_bytes()),
            Payload::U32(v) => out.extend_from_slice(&v.to_le_bytes()),
            Payload::U64(v) => out.extend_from_slice(&v.to_le_bytes()),
            Payload::F32(v) => out.extend_from_slice(&v.to_bits().to_le_bytes()),
            Payload::F64(v) => out.extend_from_slice(&v.to_bits().to_le_bytes()),
            Payload::String { bytes, .. } => {
                out.extend_from_slice(&(bytes.len() as u64).to_le_bytes());
                out.extend_from_slice(bytes);
            }
            Payload::Pointer(v) => out.extend_from_slice(&v.to_le_bytes()),
            Payload::Composite(handle) => {
                out.extend_from_slice(&handle.region_handle.to_le_bytes());
            }
        }
        out
    }

    /// Composite payloads reference a shared memory region; per §4.5 such
    /// arguments are never cacheable because the referenced bytes can
    /// change out from under the cached key.
    pub fn is_cacheable(&self) -> bool {
        !matches!(self.payload, Payload::Composite(_))
    }
}
