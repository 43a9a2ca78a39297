// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

//! The top-level LibPolyCall FFI runtime crate: a single [`Context`]
//! wires together the type/conversion engine, the memory bridge, the
//! security layer, and the registry/dispatcher/performance pipeline
//! behind the public API an embedder calls.

pub mod config;
pub mod context;

pub use config::{PolyCallConfig, PolyCallConfigBuilder};
pub use context::Context;

pub use polycall_bridge::{BridgeContract, BridgeFaultKind, CalleeHandle, CapabilityFlags, NativeBridge, NativeCallee, NativeOpaque};
pub use polycall_conversion::{ConversionEngine, ConversionRule, LossyPolicy, TypeHandle, TypeKey, TypeRegistry, ANY_LANGUAGE};
pub use polycall_memory::{Borrower, GcNotifier, MemoryBridge, MemoryRegion, RegionHandle, ReleaseOutcome};
pub use polycall_performance::{fingerprint, BatchQueue, BatchSubmission, CallTrace, PerformanceCache};
pub use polycall_registry::{Dispatcher, FunctionRecord, LanguageRegistration, Registry};
pub use polycall_security::{
    AccessResult, AclEntry, ActionKind, AuditEvent, AuditLevel, AuditLog, DenialReason,
    SecurityContext, SecurityLevel, SecurityPolicy, SecurityState,
};
pub use polycall_types::{
    ArrayLength, CanonicalTypeId, CanonicalValue, CompositeHandle, ConversionErrorKind,
    FieldDescriptor, FunctionSignature, IsolationLevel, NotFoundKind, Ownership, Parameter,
    Payload, PermissionBits, PolyCallError, Result, TypeDescriptor,
};
