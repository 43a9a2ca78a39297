// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::any::Any;
use std::sync::Arc;

use polycall_types::{CanonicalValue, FunctionSignature, Result, TypeDescriptor};

/// An opaque value handed back and forth across the bridge boundary.
/// The core never inspects its contents; only the adapter that produced
/// it downcasts it back to a concrete type.
pub type NativeOpaque = Box<dyn Any + Send + Sync>;

/// An opaque callee reference supplied by the source bridge at function
/// registration (§3 Function record: "function pointer / opaque callee
/// handle supplied by the source bridge").
pub type CalleeHandle = Box<dyn Any + Send + Sync>;

/// Capability flags an adapter declares about itself at language
/// registration (§3 Language registration). Mirrors `PermissionBits`'
/// bitset shape since both are small fixed capability sets checked with
/// single instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CapabilityFlags(u8);

impl CapabilityFlags {
    pub const NONE: CapabilityFlags = CapabilityFlags(0);
    /// The adapter tolerates concurrent invocation from different
    /// threads; absent this flag the core serializes dispatch to the
    /// adapter via an adapter-scoped lock (§5).
    pub const THREAD_SAFE: CapabilityFlags = CapabilityFlags(1 << 0);
    /// The adapter supports being asked to translate an in-flight host
    /// exception rather than only a terminal one.
    pub const EXCEPTION_TRANSLATION: CapabilityFlags = CapabilityFlags(1 << 1);

    pub fn contains(self, flag: CapabilityFlags) -> bool {
        self.0 & flag.0 == flag.0
    }

    pub fn union(self, other: CapabilityFlags) -> CapabilityFlags {
        CapabilityFlags(self.0 | other.0)
    }

    pub fn is_thread_safe(self) -> bool {
        self.contains(CapabilityFlags::THREAD_SAFE)
    }
}

impl std::ops::BitOr for CapabilityFlags {
    type Output = CapabilityFlags;
    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

/// Sub-kind of a translated host exception (§9: "Exception translation
/// from host languages -> a tagged `BridgeFault{kind, diagnostic}`
/// variant; the core never rethrows").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeFaultKind {
    HostException,
    HostPanic,
    InvalidCallee,
    Timeout,
}

impl std::fmt::Display for BridgeFaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BridgeFaultKind::HostException => "host exception",
            BridgeFaultKind::HostPanic => "host panic",
            BridgeFaultKind::InvalidCallee => "invalid callee handle",
            BridgeFaultKind::Timeout => "timeout",
        };
        write!(f, "{s}")
    }
}

/// The interface every per-language adapter implements (§4.6). The core
/// holds adapters behind `Arc<dyn BridgeContract>`; adapters are
/// stateless with respect to the core — whatever state they need lives
/// inside the `CalleeHandle`s and `CanonicalValue`s the core hands them.
pub trait BridgeContract: Send + Sync {
    /// The language label this adapter was registered under.
    fn language(&self) -> &str;

    fn capability_flags(&self) -> CapabilityFlags;

    fn initialize(&self) -> Result<()>;

    fn cleanup(&self);

    fn convert_to_native(
        &self,
        value: &CanonicalValue,
        descriptor: &TypeDescriptor,
    ) -> Result<NativeOpaque>;

    fn convert_from_native(
        &self,
        native: &NativeOpaque,
        descriptor: &TypeDescriptor,
    ) -> Result<CanonicalValue>;

    fn register_function(
        &self,
        name: &str,
        callee: CalleeHandle,
        signature: Arc<FunctionSignature>,
        flags: CapabilityFlags,
    ) -> Result<()>;

    /// Converts `args` to native, runs the callee, converts the result
    /// back to canonical. Any host-side failure surfaces as
    /// `PolyCallError::BridgeFault`, never as a native panic escaping
    /// across the boundary.
    fn call(&self, name: &str, args: &[CanonicalValue]) -> Result<CanonicalValue>;

    fn acquire_memory(&self, handle: u64, size: usize) -> Result<()>;

    fn release_memory(&self, handle: u64) -> Result<()>;

    /// Translates an opaque host-side failure into a diagnostic string
    /// plus its `BridgeFaultKind`, for callers that caught one directly
    /// rather than going through `call`.
    fn translate_exception(&self, opaque: &NativeOpaque) -> (String, BridgeFaultKind);
}
