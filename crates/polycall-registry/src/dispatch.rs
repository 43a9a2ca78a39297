// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::sync::Arc;

use polycall_conversion::{ConversionEngine, TypeKey};
use polycall_performance::{fingerprint, trace_begin, PerformanceCache};
use polycall_security::{ActionKind, AuditEvent, SecurityContext};
use polycall_types::{CanonicalValue, PolyCallError, Result};

use crate::registry::Registry;

/// Coordinates C1 (conversion), C3 (security), C4 (this registry), C5
/// (performance) and C6 (the target bridge) for a single dispatched
/// call, implementing the §4.4 dispatch algorithm end to end.
pub struct Dispatcher {
    pub registry: Registry,
    pub conversion: Arc<ConversionEngine>,
    pub security: Arc<SecurityContext>,
    pub performance: Option<Arc<PerformanceCache>>,
}

impl Dispatcher {
    pub fn new(
        registry: Registry,
        conversion: Arc<ConversionEngine>,
        security: Arc<SecurityContext>,
        performance: Option<Arc<PerformanceCache>>,
    ) -> Self {
        Self {
            registry,
            conversion,
            security,
            performance,
        }
    }

    /// Whether `arg` satisfies parameter `param_type`: an exact type-id
    /// match, or a conversion the type engine can perform between them
    /// (checked, not applied — §4.4 step 3 requires this before any
    /// conversion happens, so a failing check leaves no partial state).
    fn compatible(&self, arg: &CanonicalValue, param_type: polycall_types::CanonicalTypeId, caller_lang: &str, target_lang: &str) -> bool {
        if arg.type_id == param_type {
            return true;
        }
        self.conversion
            .convert(arg, caller_lang, target_lang, TypeKey::Primitive(param_type))
            .is_ok()
    }

    /// Dispatches `name(args)` as called by `caller_language` (with
    /// optional `caller_context` for ACL context matching), per §4.4.
    pub fn call(
        &self,
        name: &str,
        args: &[CanonicalValue],
        caller_language: &str,
        caller_context: Option<&str>,
    ) -> Result<CanonicalValue> {
        // Step 1: resolve the function record. Cloning the Arc here means
        // a concurrent unregister cannot invalidate this in-flight call.
        let record = self.registry.lookup_function(name)?;

        // Step 2: resolve the target language bridge.
        let target = self.registry.lookup_language(&record.source_language)?;

        // Step 3: signature compatibility, before any conversion.
        if !record.signature.accepts_arg_count(args.len()) {
            return Err(PolyCallError::SignatureMismatch(format!(
                "'{name}' expects {} argument(s){}, got {}",
                record.signature.fixed_arity(),
                if record.signature.variadic { " or more" } else { "" },
                args.len()
            )));
        }
        for (arg, param) in args.iter().zip(record.signature.params.iter()) {
            if !self.compatible(arg, param.type_id, caller_language, &record.source_language) {
                return Err(PolyCallError::SignatureMismatch(format!(
                    "'{name}' parameter {:?} is incompatible with argument type {:?}",
                    param.type_id, arg.type_id
                )));
            }
        }
        if let Some(tail_type) = record.signature.variadic_type {
            for arg in args.iter().skip(record.signature.params.len()) {
                if !self.compatible(arg, tail_type, caller_language, &record.source_language) {
                    return Err(PolyCallError::SignatureMismatch(format!(
                        "'{name}' variadic tail element {:?} is incompatible with argument type {:?}",
                        tail_type, arg.type_id
                    )));
                }
            }
        }

        // Step 4: security access check.
        let access = self.security.verify_access(name, caller_language, caller_context)?;
        if !access.allowed {
            return Err(PolyCallError::PermissionDenied {
                missing: access.missing_permissions,
            });
        }

        let trace = trace_begin(name, caller_language, &record.source_language);

        // Step 5: performance cache check.
        let cache_key = self
            .performance
            .as_ref()
            .and_then(|_| fingerprint(name, args));
        if let (Some(cache), Some(key)) = (&self.performance, &cache_key) {
            if let Some(cached) = cache.get(name, key) {
                trace.finish(true);
                self.audit_call(caller_language, &record.source_language, name, true);
                return Ok(cached);
            }
        }

        // Step 6: invoke via the bridge contract.
        let outcome = target.bridge.call(name, args);

        trace.finish(false);

        match &outcome {
            Ok(result) => {
                // Step 7: record the result if caching is enabled.
                if let (Some(cache), Some(key)) = (&self.performance, cache_key) {
                    cache.store(name, key, result.clone());
                }
                self.audit_call(caller_language, &record.source_language, name, true);
            }
            Err(_) => {
                self.audit_call(caller_language, &record.source_language, name, false);
            }
        }

        // Step 8: audit already emitted above; propagate the outcome.
        outcome
    }

    fn audit_call(&self, source: &str, target: &str, function: &str, success: bool) {
        let _ = self.security.audit(AuditEvent::new(
            source,
            target,
            function,
            ActionKind::Call,
            success,
        ));
    }

    /// Bumps the performance cache's generation for `name`, invalidating
    /// every entry cached for it — called whenever `name` is
    /// re-registered (§4.5).
    pub fn invalidate_cache(&self, name: &str) {
        if let Some(cache) = &self.performance {
            cache.bump_generation(name);
        }
    }
}
