// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;

use polycall_core::{
    AclEntry, ActionKind, BridgeContract, BridgeFaultKind, CalleeHandle, CanonicalTypeId,
    CanonicalValue, CapabilityFlags, Context, FieldDescriptor, FunctionSignature, IsolationLevel,
    NativeOpaque, NotFoundKind, Parameter, Payload, PermissionBits, PolyCallConfig, PolyCallError,
    SecurityLevel, SecurityPolicy, TypeDescriptor,
};
use polycall_conversion::convert_struct_fields;

struct CountingBridge {
    calls: AtomicUsize,
    delay: Option<Duration>,
}

impl CountingBridge {
    fn new() -> Self {
        Self { calls: AtomicUsize::new(0), delay: None }
    }

    fn with_delay(delay: Duration) -> Self {
        Self { calls: AtomicUsize::new(0), delay: Some(delay) }
    }
}

impl BridgeContract for CountingBridge {
    fn language(&self) -> &str {
        "host"
    }
    fn capability_flags(&self) -> CapabilityFlags {
        CapabilityFlags::THREAD_SAFE
    }
    fn initialize(&self) -> polycall_core::Result<()> {
        Ok(())
    }
    fn cleanup(&self) {}
    fn convert_to_native(&self, v: &CanonicalValue, _: &TypeDescriptor) -> polycall_core::Result<NativeOpaque> {
        Ok(Box::new(v.clone()))
    }
    fn convert_from_native(&self, n: &NativeOpaque, _: &TypeDescriptor) -> polycall_core::Result<CanonicalValue> {
        Ok(n.downcast_ref::<CanonicalValue>().cloned().unwrap())
    }
    fn register_function(
        &self,
        _name: &str,
        _callee: CalleeHandle,
        _sig: Arc<FunctionSignature>,
        _flags: CapabilityFlags,
    ) -> polycall_core::Result<()> {
        Ok(())
    }
    fn call(&self, _name: &str, args: &[CanonicalValue]) -> polycall_core::Result<CanonicalValue> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            thread::sleep(delay);
        }
        Ok(args.first().cloned().unwrap_or_else(CanonicalValue::void))
    }
    fn acquire_memory(&self, _h: u64, _s: usize) -> polycall_core::Result<()> {
        Ok(())
    }
    fn release_memory(&self, _h: u64) -> polycall_core::Result<()> {
        Ok(())
    }
    fn translate_exception(&self, _o: &NativeOpaque) -> (String, BridgeFaultKind) {
        ("".into(), BridgeFaultKind::HostException)
    }
}

fn sig_i64_from_i32() -> Arc<FunctionSignature> {
    Arc::new(FunctionSignature::new(CanonicalTypeId::I64, vec![Parameter::new(CanonicalTypeId::I64)]))
}

// Scenario 1: a caller passes a narrower primitive than the declared
// parameter type; the dispatcher's compatibility check performs the
// lossless widening conversion and the call proceeds.
#[test]
fn primitive_widening_is_accepted_at_dispatch() {
    let ctx = Context::init(PolyCallConfig::default());
    let bridge = Arc::new(CountingBridge::new());
    ctx.register_language("host", bridge.clone()).unwrap();
    ctx.expose_function("widen", "host", sig_i64_from_i32(), PermissionBits::NONE, IsolationLevel::Function)
        .unwrap();

    let result = ctx.call("widen", &[CanonicalValue::i32(41)], "caller", None).unwrap();
    assert!(matches!(result.payload, Payload::I32(41)));
}

// A variadic function's tail is typed (a sequence type id, not a bare
// flag): an incompatible tail argument is rejected at the signature
// check, before the call ever reaches the bridge.
#[test]
fn variadic_tail_argument_is_type_checked() {
    let ctx = Context::init(PolyCallConfig::default());
    let bridge = Arc::new(CountingBridge::new());
    ctx.register_language("host", bridge.clone()).unwrap();
    let sig = Arc::new(
        FunctionSignature::new(CanonicalTypeId::I64, vec![Parameter::new(CanonicalTypeId::I64)])
            .variadic(CanonicalTypeId::I64),
    );
    ctx.expose_function("sum", "host", sig, PermissionBits::NONE, IsolationLevel::Function)
        .unwrap();

    let ok = ctx
        .call("sum", &[CanonicalValue::i32(1), CanonicalValue::i32(2), CanonicalValue::i32(3)], "caller", None)
        .unwrap();
    assert!(matches!(ok.payload, Payload::I32(1)));
    assert_eq!(bridge.calls.load(Ordering::SeqCst), 1);

    let err = ctx
        .call(
            "sum",
            &[CanonicalValue::i32(1), CanonicalValue { type_id: CanonicalTypeId::Void, payload: Payload::Void }],
            "caller",
            None,
        )
        .unwrap_err();
    assert!(matches!(err, PolyCallError::SignatureMismatch(_)));
    assert_eq!(bridge.calls.load(Ordering::SeqCst), 1, "rejected tail argument never reaches the bridge");
}

// Scenario 2: an ACL entry requires ADMIN for "secret"; a caller without
// it is denied and exactly one access_check audit event is recorded.
#[test]
fn security_denial_is_reported_and_audited_once() {
    let mut policy = SecurityPolicy::default();
    policy.security_level = SecurityLevel::Medium;
    policy.acl.push(AclEntry::new("secret", "*", PermissionBits::ADMIN));
    let config = PolyCallConfig::builder().build();
    let ctx = Context::init(config);
    ctx.load_security_policy(&policy.to_toml().unwrap()).unwrap();

    let bridge = Arc::new(CountingBridge::new());
    ctx.register_language("host", bridge.clone()).unwrap();
    ctx.expose_function(
        "secret",
        "host",
        Arc::new(FunctionSignature::new(CanonicalTypeId::Void, vec![])),
        PermissionBits::ADMIN,
        IsolationLevel::Function,
    )
    .unwrap();

    let before = ctx.security.audit.len();
    let err = ctx.call("secret", &[], "python", None).unwrap_err();
    assert!(matches!(err, PolyCallError::PermissionDenied { missing } if missing == PermissionBits::ADMIN));
    assert_eq!(bridge.calls.load(Ordering::SeqCst), 0, "denied call never reaches the bridge");

    let events = ctx.security.audit.snapshot();
    let new_events = &events[before..];
    assert_eq!(new_events.len(), 1);
    assert!(matches!(new_events[0].action, ActionKind::AccessCheck));
    assert!(!new_events[0].allowed);
}

// Scenario 3: acquire a region, share a reduced-permission borrow,
// reject an escalation attempt, then run the share/release cycle to
// completion.
#[test]
fn memory_share_escalate_and_release_cycle() {
    let ctx = Context::init(PolyCallConfig::default());
    let handle = ctx
        .acquire_memory(256, 8, "owner", PermissionBits::READ | PermissionBits::WRITE | PermissionBits::SHARE, false)
        .unwrap();

    ctx.share_memory(handle, "reader", PermissionBits::READ).unwrap();
    let region = ctx.query_memory(handle).unwrap();
    assert_eq!(region.borrower("reader").unwrap().permissions, PermissionBits::READ);

    let escalation = ctx.memory.add_borrower(handle, "escalator", PermissionBits::ADMIN);
    assert!(matches!(escalation, Err(PolyCallError::PermissionEscalation { .. })));

    ctx.memory.remove_borrower(handle, "reader").unwrap();
    ctx.memory.decref(handle).unwrap();
    let outcome = ctx.release_memory(handle, false).unwrap();
    assert!(outcome.freed);
    assert!(!outcome.forced);
    assert!(ctx.query_memory(handle).is_err());
}

// Scenario 4: repeated calls with identical arguments hit the cache;
// re-exposing the function bumps the generation and forces a miss.
#[test]
fn cache_hit_then_generation_bump_forces_a_miss() {
    let ctx = Context::init(PolyCallConfig::default());
    let bridge = Arc::new(CountingBridge::new());
    ctx.register_language("host", bridge.clone()).unwrap();
    let sig = Arc::new(FunctionSignature::new(CanonicalTypeId::I32, vec![Parameter::new(CanonicalTypeId::I32)]));
    ctx.expose_function("square", "host", sig.clone(), PermissionBits::NONE, IsolationLevel::Function)
        .unwrap();

    ctx.call("square", &[CanonicalValue::i32(5)], "caller", None).unwrap();
    ctx.call("square", &[CanonicalValue::i32(5)], "caller", None).unwrap();
    assert_eq!(bridge.calls.load(Ordering::SeqCst), 1, "second identical call is served from cache");

    ctx.unregister_function("square").unwrap();
    ctx.expose_function("square", "host", sig, PermissionBits::NONE, IsolationLevel::Function)
        .unwrap();
    ctx.call("square", &[CanonicalValue::i32(5)], "caller", None).unwrap();
    assert_eq!(bridge.calls.load(Ordering::SeqCst), 2, "re-registration invalidates the prior cache entry");
}

// Scenario 5: a call in flight against a slow function survives a
// concurrent unregister; a subsequent call sees FunctionNotFound.
#[test]
fn in_flight_call_survives_concurrent_unregister() {
    let ctx = Arc::new(Context::init(PolyCallConfig::default()));
    let bridge = Arc::new(CountingBridge::with_delay(Duration::from_millis(150)));
    ctx.register_language("host", bridge.clone()).unwrap();
    ctx.expose_function(
        "slow",
        "host",
        Arc::new(FunctionSignature::new(CanonicalTypeId::I32, vec![Parameter::new(CanonicalTypeId::I32)])),
        PermissionBits::NONE,
        IsolationLevel::Function,
    )
    .unwrap();

    let barrier = Arc::new(Barrier::new(2));

    let caller_ctx = Arc::clone(&ctx);
    let caller_barrier = Arc::clone(&barrier);
    let caller = thread::spawn(move || {
        caller_barrier.wait();
        caller_ctx.call("slow", &[CanonicalValue::i32(1)], "caller", None)
    });

    barrier.wait();
    thread::sleep(Duration::from_millis(30));
    ctx.unregister_function("slow").unwrap();

    let result = caller.join().unwrap();
    assert!(result.is_ok(), "a call already dispatched completes despite the concurrent unregister");

    let err = ctx.call("slow", &[CanonicalValue::i32(1)], "caller", None).unwrap_err();
    assert!(matches!(err, PolyCallError::NotFound { kind: NotFoundKind::Function, .. }));
}

// Scenario 6: struct field conversion narrows f64 -> f32 fields (lossy,
// rejected under the default no-wrap policy) and widens f32 -> f64
// fields (always exact).
#[test]
fn struct_field_mapping_narrows_and_widens() {
    let engine = polycall_conversion::ConversionEngine::new();

    let point_f32 = TypeDescriptor::Struct {
        total_size: 8,
        alignment: 4,
        fields: vec![
            FieldDescriptor { name: "x".into(), type_id: CanonicalTypeId::F32, offset: 0, optional: false },
            FieldDescriptor { name: "y".into(), type_id: CanonicalTypeId::F32, offset: 4, optional: false },
        ],
    };

    let mut source_values = HashMap::new();
    source_values.insert("x".to_string(), CanonicalValue::f64(1.5));
    source_values.insert("y".to_string(), CanonicalValue::f64(2.25));

    let converted = convert_struct_fields(&engine, "A", "B", &point_f32, &source_values).unwrap();
    assert!(matches!(converted["x"].payload, Payload::F32(v) if v == 1.5));
    assert!(matches!(converted["y"].payload, Payload::F32(v) if v == 2.25));

    let point_f64 = TypeDescriptor::Struct {
        total_size: 16,
        alignment: 8,
        fields: vec![
            FieldDescriptor { name: "x".into(), type_id: CanonicalTypeId::F64, offset: 0, optional: false },
            FieldDescriptor { name: "y".into(), type_id: CanonicalTypeId::F64, offset: 8, optional: true },
        ],
    };
    let mut partial = HashMap::new();
    partial.insert("x".to_string(), CanonicalValue::f32(3.0));
    let widened = convert_struct_fields(&engine, "A", "B", &point_f64, &partial).unwrap();
    assert!(matches!(widened["x"].payload, Payload::F64(v) if v == 3.0));
    assert!(matches!(widened["y"].payload, Payload::F64(v) if v == 0.0), "missing optional field is zero-initialized");

    let missing_required = HashMap::new();
    let err = convert_struct_fields(&engine, "A", "B", &point_f32, &missing_required).unwrap_err();
    assert!(matches!(err, PolyCallError::ConversionFailed { .. }));
}
