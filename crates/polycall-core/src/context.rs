// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::sync::Arc;

use polycall_bridge::BridgeContract;
use polycall_conversion::ConversionEngine;
use polycall_memory::{MemoryBridge, ReleaseOutcome};
use polycall_registry::{Dispatcher, LanguageRegistration, Registry};
use polycall_security::{ActionKind, AuditEvent, SecurityContext, SecurityPolicy};
use polycall_types::{
    CanonicalValue, FunctionSignature, IsolationLevel, PermissionBits, PolyCallError, Result,
    TypeDescriptor,
};

use crate::config::PolyCallConfig;

/// The top-level handle an embedder holds (§4 Context lifecycle): owns
/// the type/conversion engine (C1), the memory bridge (C2), the
/// security context (C3), and the registry/dispatcher pair (C4, wired
/// to the performance cache C5 and the bridge adapters C6).
///
/// One `Context` per runtime instance. There is no global/static state
/// anywhere below this struct — two `Context`s in the same process are
/// fully independent.
pub struct Context {
    pub conversion: Arc<ConversionEngine>,
    pub memory: Arc<MemoryBridge>,
    pub security: Arc<SecurityContext>,
    pub dispatcher: Dispatcher,
}

impl Context {
    /// Brings up every subsystem from `config` (§6). Construction cannot
    /// fail: capacities are enforced lazily, at the point an operation
    /// would exceed them, not at init.
    pub fn init(config: PolyCallConfig) -> Self {
        let conversion = Arc::new(ConversionEngine::with_registry(Arc::new(
            polycall_conversion::TypeRegistry::with_capacity(config.type_capacity),
        )));
        let memory = Arc::new(MemoryBridge::new(config.memory_pool_size));

        let mut policy = SecurityPolicy::default();
        policy.security_level = config.security_level;
        policy.default_deny = config.default_deny;
        policy.audit_level = config.audit_level;
        let security = Arc::new(SecurityContext::new(policy, config.audit_ring_size));

        let registry = Registry::new(config.function_capacity);
        let performance = if config.enable_performance_cache {
            Some(Arc::new(polycall_performance::PerformanceCache::new(
                config.performance_cache_capacity,
            )))
        } else {
            None
        };
        let dispatcher = Dispatcher::new(registry, Arc::clone(&conversion), Arc::clone(&security), performance);

        Self {
            conversion,
            memory,
            security,
            dispatcher,
        }
    }

    /// Transitions the security context to `Terminating` then
    /// `Destroyed` (§4.3). Registered languages are not individually
    /// torn down here — callers that need per-language `cleanup()` to
    /// run should `unregister_language` each one first.
    pub fn shutdown(self) {
        let _ = self.security.begin_terminating();
        self.security.destroy();
    }

    pub fn register_language(&self, label: &str, bridge: Arc<dyn BridgeContract>) -> Result<()> {
        self.dispatcher
            .registry
            .register_language(LanguageRegistration::new(label, bridge))
    }

    pub fn unregister_language(&self, label: &str) -> Result<()> {
        self.dispatcher.registry.unregister_language(label)
    }

    pub fn language_count(&self) -> usize {
        self.dispatcher.registry.language_count()
    }

    pub fn type_count(&self) -> usize {
        self.conversion.types.len()
    }

    /// Exposes `name` for dispatch (§4.4/§4.5). Also records the
    /// function's permission/isolation posture with the security layer
    /// and, when re-registering a previously-exposed name, invalidates
    /// any cached results for it so a stale cache entry never survives
    /// a redefinition.
    #[allow(clippy::too_many_arguments)]
    pub fn expose_function(
        &self,
        name: &str,
        source_language: &str,
        signature: Arc<FunctionSignature>,
        permissions: PermissionBits,
        isolation: IsolationLevel,
    ) -> Result<()> {
        let was_registered = self.dispatcher.registry.lookup_function(name).is_ok();
        self.dispatcher
            .registry
            .expose_function(name, source_language, signature, permissions, isolation)?;
        self.security.register_function(name, permissions, isolation)?;
        if was_registered {
            self.dispatcher.invalidate_cache(name);
        }
        Ok(())
    }

    pub fn unregister_function(&self, name: &str) -> Result<()> {
        self.dispatcher.registry.unregister_function(name)?;
        self.security.unregister_function(name)?;
        self.dispatcher.invalidate_cache(name);
        Ok(())
    }

    pub fn function_count(&self) -> usize {
        self.dispatcher.registry.function_count()
    }

    pub fn call(
        &self,
        name: &str,
        args: &[CanonicalValue],
        caller_language: &str,
        caller_context: Option<&str>,
    ) -> Result<CanonicalValue> {
        self.dispatcher.call(name, args, caller_language, caller_context)
    }

    pub fn register_type(&self, name: &str, descriptor: TypeDescriptor) -> Result<polycall_conversion::TypeHandle> {
        self.conversion.types.register_type(name, descriptor)
    }

    pub fn acquire_memory(
        &self,
        size: usize,
        alignment: usize,
        owner: &str,
        permissions: PermissionBits,
        sensitive: bool,
    ) -> Result<polycall_memory::RegionHandle> {
        self.memory.acquire(size, alignment, owner, permissions, sensitive)
    }

    pub fn share_memory(
        &self,
        handle: polycall_memory::RegionHandle,
        borrower: &str,
        requested: PermissionBits,
    ) -> Result<()> {
        let outcome = self.memory.add_borrower(handle, borrower, requested);
        if outcome.is_ok() {
            let _ = self.security.audit(AuditEvent::new(
                borrower,
                "core",
                handle.to_string(),
                ActionKind::Share,
                true,
            ));
        }
        outcome
    }

    /// Releases `handle`. A forced release that actually invalidated
    /// live borrowers is itself a policy violation worth auditing
    /// (§4.2 Design Notes: "a forced release ... always emits a
    /// `policy_violation` audit event"), independent of whether the
    /// release call itself succeeds.
    pub fn release_memory(&self, handle: polycall_memory::RegionHandle, force: bool) -> Result<ReleaseOutcome> {
        let outcome = self.memory.release(handle, force)?;
        if outcome.forced {
            let _ = self.security.audit(
                AuditEvent::new(
                    "core",
                    "core",
                    handle.to_string(),
                    ActionKind::PolicyViolation,
                    false,
                )
                .with_detail(format!(
                    "forced release invalidated {} borrower(s)",
                    outcome.invalidated_borrowers
                )),
            );
        } else {
            let _ = self.security.audit(AuditEvent::new(
                "core",
                "core",
                handle.to_string(),
                ActionKind::Release,
                true,
            ));
        }
        Ok(outcome)
    }

    pub fn query_memory(&self, handle: polycall_memory::RegionHandle) -> Result<polycall_memory::MemoryRegion> {
        self.memory.query(handle)
    }

    /// Loads a TOML security policy document, replacing the active one
    /// wholesale (§6). Existing per-function declarations are
    /// unaffected; only ACL/permission/isolation/security-level fields
    /// come from the document.
    pub fn load_security_policy(&self, text: &str) -> Result<()> {
        self.security.load_policy(text)
    }

    pub fn save_security_policy(&self) -> Result<String> {
        self.security.save_policy()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("languages", &self.language_count())
            .field("functions", &self.function_count())
            .field("types", &self.type_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use polycall_bridge::{BridgeFaultKind, CalleeHandle, CapabilityFlags, NativeOpaque};
    use polycall_types::{CanonicalTypeId, Parameter};

    struct EchoBridge;
    impl BridgeContract for EchoBridge {
        fn language(&self) -> &str {
            "echo"
        }
        fn capability_flags(&self) -> CapabilityFlags {
            CapabilityFlags::NONE
        }
        fn initialize(&self) -> Result<()> {
            Ok(())
        }
        fn cleanup(&self) {}
        fn convert_to_native(&self, v: &CanonicalValue, _: &TypeDescriptor) -> Result<NativeOpaque> {
            Ok(Box::new(v.clone()))
        }
        fn convert_from_native(&self, n: &NativeOpaque, _: &TypeDescriptor) -> Result<CanonicalValue> {
            Ok(n.downcast_ref::<CanonicalValue>().cloned().unwrap())
        }
        fn register_function(
            &self,
            _name: &str,
            _callee: CalleeHandle,
            _sig: Arc<FunctionSignature>,
            _flags: CapabilityFlags,
        ) -> Result<()> {
            Ok(())
        }
        fn call(&self, _name: &str, args: &[CanonicalValue]) -> Result<CanonicalValue> {
            Ok(args.first().cloned().unwrap_or_else(CanonicalValue::void))
        }
        fn acquire_memory(&self, _h: u64, _s: usize) -> Result<()> {
            Ok(())
        }
        fn release_memory(&self, _h: u64) -> Result<()> {
            Ok(())
        }
        fn translate_exception(&self, _o: &NativeOpaque) -> (String, BridgeFaultKind) {
            ("".into(), BridgeFaultKind::HostException)
        }
    }

    fn ctx() -> Context {
        Context::init(PolyCallConfig::default())
    }

    #[test]
    fn expose_and_call_round_trip() {
        let ctx = ctx();
        ctx.register_language("echo", Arc::new(EchoBridge)).unwrap();
        ctx.expose_function(
            "identity",
            "echo",
            Arc::new(FunctionSignature::new(CanonicalTypeId::I32, vec![Parameter::new(CanonicalTypeId::I32)])),
            PermissionBits::NONE,
            IsolationLevel::Function,
        )
        .unwrap();
        let result = ctx.call("identity", &[CanonicalValue::i32(7)], "echo", None).unwrap();
        assert!(matches!(result.payload, polycall_types::Payload::I32(7)));
    }

    #[test]
    fn reexposing_a_function_invalidates_its_cache_entry() {
        let ctx = ctx();
        ctx.register_language("echo", Arc::new(EchoBridge)).unwrap();
        let sig = Arc::new(FunctionSignature::new(CanonicalTypeId::I32, vec![Parameter::new(CanonicalTypeId::I32)]));
        ctx.expose_function("f", "echo", sig.clone(), PermissionBits::NONE, IsolationLevel::Function)
            .unwrap();
        ctx.call("f", &[CanonicalValue::i32(1)], "echo", None).unwrap();

        ctx.unregister_function("f").unwrap();
        ctx.expose_function("f", "echo", sig, PermissionBits::NONE, IsolationLevel::Function)
            .unwrap();
        // No direct cache-hit hook is exposed here; this asserts the
        // invalidation path at least runs without error for a fresh
        // registration under the same name.
        ctx.call("f", &[CanonicalValue::i32(2)], "echo", None).unwrap();
    }

    #[test]
    fn forced_release_with_live_borrowers_audits_policy_violation() {
        let ctx = ctx();
        let handle = ctx
            .acquire_memory(1024, 8, "owner", PermissionBits::READ | PermissionBits::SHARE, false)
            .unwrap();
        ctx.share_memory(handle, "borrower", PermissionBits::READ).unwrap();
        let before = ctx.security.audit.len();
        let outcome = ctx.release_memory(handle, true).unwrap();
        assert!(outcome.forced);
        let events = ctx.security.audit.snapshot();
        assert!(events.len() > before);
        assert!(matches!(events.last().unwrap().action, ActionKind::PolicyViolation));
    }

    #[test]
    fn unregistered_language_rejects_expose() {
        let ctx = ctx();
        let err = ctx
            .expose_function(
                "f",
                "missing",
                Arc::new(FunctionSignature::new(CanonicalTypeId::Void, vec![])),
                PermissionBits::NONE,
                IsolationLevel::Function,
            )
            .unwrap_err();
        assert!(matches!(err, PolyCallError::NotFound { .. }));
    }
}
