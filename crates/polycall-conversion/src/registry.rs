// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use polycall_types::{NotFoundKind, PolyCallError, Result, TypeDescriptor};

/// A stable handle into the [`TypeRegistry`], returned by `register_type`
/// and used everywhere a named (composite) type needs to be referenced
/// without re-resolving its name.
pub type TypeHandle = usize;

struct Inner {
    by_handle: Vec<Option<(String, Arc<TypeDescriptor>)>>,
    by_name: HashMap<String, TypeHandle>,
}

/// Append-only catalogue of named type descriptors, keyed both by a
/// generated stable handle and by the name supplied at registration
/// (§4.1). Registration never overwrites: a duplicate name is an
/// `AlreadyRegistered` error, and slots are never reused, so a handle
/// obtained before an (impossible) removal would never silently start
/// pointing at a different type.
pub struct TypeRegistry {
    inner: RwLock<Inner>,
    capacity: usize,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::with_capacity(usize::MAX)
    }

    /// `capacity` bounds the number of distinct named types (the
    /// `type_capacity` configured at init, §6); exceeding it returns
    /// `CapacityExceeded` without registering anything.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                by_handle: Vec::new(),
                by_name: HashMap::new(),
            }),
            capacity,
        }
    }

    pub fn register_type(&self, name: &str, descriptor: TypeDescriptor) -> Result<TypeHandle> {
        let mut inner = self.inner.write();
        if inner.by_name.contains_key(name) {
            return Err(PolyCallError::AlreadyRegistered(name.to_string()));
        }
        if inner.by_name.len() >= self.capacity {
            return Err(PolyCallError::CapacityExceeded {
                resource: "type_capacity".into(),
            });
        }
        let handle = inner.by_handle.len();
        inner
            .by_handle
            .push(Some((name.to_string(), Arc::new(descriptor))));
        inner.by_name.insert(name.to_string(), handle);
        tracing::debug!(type_name = name, handle, "registered type descriptor");
        Ok(handle)
    }

    pub fn lookup_by_handle(&self, handle: TypeHandle) -> Result<Arc<TypeDescriptor>> {
        let inner = self.inner.read();
        inner
            .by_handle
            .get(handle)
            .and_then(|slot| slot.as_ref())
            .map(|(_, desc)| Arc::clone(desc))
            .ok_or_else(|| PolyCallError::NotFound {
                kind: NotFoundKind::Type,
                name: format!("#{handle}"),
            })
    }

    pub fn lookup_by_name(&self, name: &str) -> Result<(TypeHandle, Arc<TypeDescriptor>)> {
        let inner = self.inner.read();
        let handle = *inner
            .by_name
            .get(name)
            .ok_or_else(|| PolyCallError::NotFound {
                kind: NotFoundKind::Type,
                name: name.to_string(),
            })?;
        let desc = inner.by_handle[handle].as_ref().unwrap().1.clone();
        Ok((handle, desc))
    }

    pub fn len(&self) -> usize {
        self.inner.read().by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
