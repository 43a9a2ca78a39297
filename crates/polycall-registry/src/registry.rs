// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use polycall_bridge::BridgeContract;
use polycall_types::{FunctionSignature, IsolationLevel, NotFoundKind, PermissionBits, PolyCallError, Result};

use crate::function::FunctionRecord;
use crate::language::LanguageRegistration;

/// The function/language registry (C4): append-mostly tables guarded by
/// their own locks, with `Arc`-based deferred reclamation so an
/// in-flight call holds a strong reference to the function record it
/// resolved even if a concurrent `unregister_function` removes the
/// table entry underneath it (§4.4, reference-counted deferral).
pub struct Registry {
    languages: RwLock<HashMap<String, Arc<LanguageRegistration>>>,
    functions: RwLock<HashMap<String, Arc<FunctionRecord>>>,
    function_capacity: usize,
}

impl Registry {
    pub fn new(function_capacity: usize) -> Self {
        Self {
            languages: RwLock::new(HashMap::new()),
            functions: RwLock::new(HashMap::new()),
            function_capacity,
        }
    }

    /// Registers a language's bridge contract. Idempotent failure on a
    /// duplicate label — re-registering requires an explicit
    /// `unregister_language` first.
    pub fn register_language(&self, registration: LanguageRegistration) -> Result<()> {
        let mut languages = self.languages.write();
        if languages.contains_key(&registration.label) {
            return Err(PolyCallError::AlreadyRegistered(registration.label));
        }
        registration.bridge.initialize()?;
        tracing::debug!(language = %registration.label, "registered language bridge");
        languages.insert(registration.label.clone(), Arc::new(registration));
        Ok(())
    }

    pub fn unregister_language(&self, label: &str) -> Result<()> {
        let mut languages = self.languages.write();
        match languages.remove(label) {
            Some(registration) => {
                registration.bridge.cleanup();
                Ok(())
            }
            None => Err(PolyCallError::NotFound {
                kind: NotFoundKind::Language,
                name: label.to_string(),
            }),
        }
    }

    pub fn lookup_language(&self, label: &str) -> Result<Arc<LanguageRegistration>> {
        self.languages
            .read()
            .get(label)
            .cloned()
            .ok_or_else(|| PolyCallError::NotFound {
                kind: NotFoundKind::Language,
                name: label.to_string(),
            })
    }

    pub fn language_count(&self) -> usize {
        self.languages.read().len()
    }

    /// Exposes a function under a globally unique name (§4.4 "expose a
    /// function"). The function's source language must already be
    /// registered.
    #[allow(clippy::too_many_arguments)]
    pub fn expose_function(
        &self,
        name: &str,
        source_language: &str,
        signature: Arc<FunctionSignature>,
        permissions: PermissionBits,
        isolation: IsolationLevel,
    ) -> Result<()> {
        if !self.languages.read().contains_key(source_language) {
            return Err(PolyCallError::NotFound {
                kind: NotFoundKind::Language,
                name: source_language.to_string(),
            });
        }
        let mut functions = self.functions.write();
        if functions.contains_key(name) {
            return Err(PolyCallError::AlreadyRegistered(name.to_string()));
        }
        if functions.len() >= self.function_capacity {
            return Err(PolyCallError::CapacityExceeded {
                resource: "function_capacity".into(),
            });
        }
        functions.insert(
            name.to_string(),
            Arc::new(FunctionRecord::new(
                name,
                source_language,
                signature,
                permissions,
                isolation,
            )),
        );
        tracing::debug!(function = name, source_language, "exposed function");
        Ok(())
    }

    pub fn unregister_function(&self, name: &str) -> Result<()> {
        let mut functions = self.functions.write();
        match functions.remove(name) {
            Some(_) => Ok(()),
            None => Err(PolyCallError::NotFound {
                kind: NotFoundKind::Function,
                name: name.to_string(),
            }),
        }
    }

    /// Resolves `name` to its current `FunctionRecord`, cloning the
    /// `Arc` before releasing the table lock so the caller's subsequent
    /// dispatch is immune to a concurrent unregister (§5 "a call
    /// observes a consistent snapshot ... for its duration").
    pub fn lookup_function(&self, name: &str) -> Result<Arc<FunctionRecord>> {
        self.functions
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| PolyCallError::NotFound {
                kind: NotFoundKind::Function,
                name: name.to_string(),
            })
    }

    pub fn function_count(&self) -> usize {
        self.functions.read().len()
    }
}
