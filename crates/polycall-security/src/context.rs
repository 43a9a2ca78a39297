// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::collections::HashMap;

use parking_lot::RwLock;
use polycall_types::{IsolationLevel, PermissionBits, PolyCallError, Result};

use crate::acl::first_match;
use crate::audit::{ActionKind, AuditEvent, AuditLog};
use crate::policy::SecurityPolicy;

/// `{uninitialized -> active -> terminating -> destroyed}` (§4.3).
/// `active` is the only state in which `verify_access`/`register_function`/
/// `audit` succeed; every other call returns `InvalidState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityState {
    Uninitialized,
    Active,
    Terminating,
    Destroyed,
}

/// A function's declared security posture, recorded at registration and
/// used both as the isolation-check input and as the ACL fallback when
/// `default_deny` is `false` and no ACL entry matches.
#[derive(Debug, Clone, Copy)]
struct FunctionSecurity {
    required: PermissionBits,
    isolation: IsolationLevel,
}

/// Why `verify_access` denied a call, for diagnostics (the `reason` field
/// of the §4.3 contract).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    NoMatchingAclEntry,
    InsufficientPermissions,
    IsolationViolation,
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DenialReason::NoMatchingAclEntry => "no matching ACL entry under default-deny policy",
            DenialReason::InsufficientPermissions => "caller permission set lacks required bits",
            DenialReason::IsolationViolation => "effective isolation level exceeds configured maximum",
        };
        write!(f, "{s}")
    }
}

/// Result of `verify_access` (§4.3 contract).
#[derive(Debug, Clone)]
pub struct AccessResult {
    pub allowed: bool,
    pub missing_permissions: PermissionBits,
    pub reason: Option<DenialReason>,
}

impl AccessResult {
    fn allow() -> Self {
        Self {
            allowed: true,
            missing_permissions: PermissionBits::NONE,
            reason: None,
        }
    }

    fn deny(missing: PermissionBits, reason: DenialReason) -> Self {
        Self {
            allowed: false,
            missing_permissions: missing,
            reason: Some(reason),
        }
    }
}

/// The zero-trust security layer (C3): ACL matching, permission
/// evaluation, isolation enforcement, and the audit ring buffer, behind
/// an explicit init/active/terminating/destroyed state machine.
pub struct SecurityContext {
    state: RwLock<SecurityState>,
    policy: RwLock<SecurityPolicy>,
    functions: RwLock<HashMap<String, FunctionSecurity>>,
    pub audit: AuditLog,
}

impl SecurityContext {
    pub fn new(policy: SecurityPolicy, audit_ring_size: usize) -> Self {
        let console_enabled = policy.audit_level != crate::policy::AuditLevel::None;
        Self {
            state: RwLock::new(SecurityState::Active),
            policy: RwLock::new(policy),
            functions: RwLock::new(HashMap::new()),
            audit: AuditLog::new(audit_ring_size, console_enabled),
        }
    }

    pub fn state(&self) -> SecurityState {
        *self.state.read()
    }

    fn require_active(&self) -> Result<()> {
        if self.state() == SecurityState::Active {
            Ok(())
        } else {
            Err(PolyCallError::InvalidState(format!(
                "security context is {:?}, expected Active",
                self.state()
            )))
        }
    }

    pub fn begin_terminating(&self) -> Result<()> {
        self.require_active()?;
        *self.state.write() = SecurityState::Terminating;
        Ok(())
    }

    pub fn destroy(&self) {
        *self.state.write() = SecurityState::Destroyed;
    }

    pub fn load_policy(&self, text: &str) -> Result<()> {
        self.require_active()?;
        let policy = SecurityPolicy::from_toml(text)?;
        *self.policy.write() = policy;
        Ok(())
    }

    pub fn save_policy(&self) -> Result<String> {
        self.require_active()?;
        self.policy.read().to_toml()
    }

    /// Records a function's declared required permissions and isolation
    /// level (§3 Function record, §4.3 contract). Overwrites any prior
    /// declaration for the same name — the registry (C4) enforces name
    /// uniqueness at the function-table level, not here.
    pub fn register_function(
        &self,
        name: &str,
        required: PermissionBits,
        isolation: IsolationLevel,
    ) -> Result<()> {
        self.require_active()?;
        self.functions
            .write()
            .insert(name.to_string(), FunctionSecurity { required, isolation });
        self.audit.record(AuditEvent::new(
            "core",
            "core",
            name,
            ActionKind::Register,
            true,
        ));
        Ok(())
    }

    pub fn unregister_function(&self, name: &str) -> Result<()> {
        self.require_active()?;
        self.functions.write().remove(name);
        self.audit.record(AuditEvent::new(
            "core",
            "core",
            name,
            ActionKind::Unregister,
            true,
        ));
        Ok(())
    }

    /// The permission bits granted to `language` (optionally narrowed by
    /// `context`, e.g. `"python:restricted"`) under the current policy's
    /// `permissions` table: each resource tag lists the language labels
    /// allowed to exercise it.
    fn available_permissions(&self, language: &str, context: Option<&str>) -> PermissionBits {
        let policy = self.policy.read();
        let mut bits = PermissionBits::NONE;
        for (tag, allowed) in &policy.permissions {
            let Some(flag) = PermissionBits::from_name(tag) else {
                continue;
            };
            for entry in allowed {
                let (entry_lang, entry_ctx) = match entry.split_once(':') {
                    Some((l, c)) => (l, Some(c)),
                    None => (entry.as_str(), None),
                };
                let lang_matches = entry_lang == "*" || entry_lang == language;
                let ctx_matches = match (entry_ctx, context) {
                    (None, _) => true,
                    (Some(c), Some(actual)) => c == actual,
                    (Some(_), None) => false,
                };
                if lang_matches && ctx_matches {
                    bits = bits.union(flag);
                    break;
                }
            }
        }
        bits
    }

    /// Verifies a call from `source_language` (optionally `source_context`)
    /// to `function` is permitted, per the §4.3 algorithm: ACL first-match
    /// (falling back to the function's own declared requirement when
    /// `default_deny` is false and nothing matches), permission subset
    /// check, then isolation-level bound check. Always audits an
    /// `access_check` event, allowed or denied.
    pub fn verify_access(
        &self,
        function: &str,
        source_language: &str,
        source_context: Option<&str>,
    ) -> Result<AccessResult> {
        self.require_active()?;

        let policy = self.policy.read();
        let required = match first_match(&policy.acl, function, source_language, source_context) {
            Some(entry) => entry.required,
            None if policy.default_deny => {
                let result = AccessResult::deny(PermissionBits::NONE, DenialReason::NoMatchingAclEntry);
                drop(policy);
                self.audit_access(function, source_language, &result);
                return Ok(result);
            }
            None => self
                .functions
                .read()
                .get(function)
                .map(|f| f.required)
                .unwrap_or(PermissionBits::NONE),
        };
        let security_level = policy.security_level;
        let caller_isolation = policy.isolation_for(source_language);
        drop(policy);

        let available = self.available_permissions(source_language, source_context);
        let missing = required.missing_from(available);
        if !missing.is_empty() {
            let result = AccessResult::deny(missing, DenialReason::InsufficientPermissions);
            self.audit_access(function, source_language, &result);
            return Ok(result);
        }

        let callee_isolation = self
            .functions
            .read()
            .get(function)
            .map(|f| f.isolation)
            .unwrap_or_default();
        let effective = caller_isolation.effective(callee_isolation);
        if effective > security_level.max_isolation() {
            let result = AccessResult::deny(PermissionBits::NONE, DenialReason::IsolationViolation);
            self.audit_access(function, source_language, &result);
            return Ok(result);
        }

        let result = AccessResult::allow();
        self.audit_access(function, source_language, &result);
        Ok(result)
    }

    fn audit_access(&self, function: &str, source_language: &str, result: &AccessResult) {
        let mut event = AuditEvent::new(
            source_language,
            "core",
            function,
            ActionKind::AccessCheck,
            result.allowed,
        )
        .with_missing(result.missing_permissions);
        if let Some(reason) = result.reason {
            event = event.with_detail(reason.to_string());
        }
        self.audit.record(event);
    }

    /// Explicit audit API for callers outside this crate (e.g. the
    /// memory bridge logging a forced release, the dispatch core
    /// logging a completed call) — §4.3 "audit an event".
    pub fn audit(&self, event: AuditEvent) -> Result<()> {
        self.require_active()?;
        self.audit.record(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::AclEntry;

    fn ctx_with_acl() -> SecurityContext {
        let mut policy = SecurityPolicy::default();
        policy
            .acl
            .push(AclEntry::new("secret", "*", PermissionBits::ADMIN));
        SecurityContext::new(policy, 16)
    }

    #[test]
    fn denied_when_caller_lacks_required_permission() {
        let ctx = ctx_with_acl();
        let result = ctx.verify_access("secret", "python", None).unwrap();
        assert!(!result.allowed);
        assert_eq!(result.missing_permissions, PermissionBits::ADMIN);
        assert_eq!(ctx.audit.len(), 1);
        let events = ctx.audit.snapshot();
        assert!(!events[0].allowed);
        assert_eq!(events[0].function_name, "secret");
    }

    #[test]
    fn allowed_when_caller_has_required_permission() {
        let mut policy = SecurityPolicy::default();
        policy
            .acl
            .push(AclEntry::new("secret", "*", PermissionBits::ADMIN));
        policy
            .permissions
            .insert("admin".into(), vec!["python".into()]);
        let ctx = SecurityContext::new(policy, 16);
        let result = ctx.verify_access("secret", "python", None).unwrap();
        assert!(result.allowed);
    }

    #[test]
    fn no_acl_match_denied_under_default_deny() {
        let ctx = SecurityContext::new(SecurityPolicy::default(), 16);
        let result = ctx.verify_access("unlisted", "python", None).unwrap();
        assert!(!result.allowed);
        assert_eq!(result.reason, Some(DenialReason::NoMatchingAclEntry));
    }

    #[test]
    fn no_acl_match_allowed_when_default_deny_disabled() {
        let mut policy = SecurityPolicy::default();
        policy.default_deny = false;
        let ctx = SecurityContext::new(policy, 16);
        let result = ctx.verify_access("unlisted", "python", None).unwrap();
        assert!(result.allowed);
    }

    #[test]
    fn isolation_violation_denies_even_with_permissions() {
        let mut policy = SecurityPolicy::default();
        policy.default_deny = false;
        policy.security_level = crate::policy::SecurityLevel::Low;
        policy.isolation.insert("python".into(), IsolationLevel::Process);
        let ctx = SecurityContext::new(policy, 16);
        ctx.register_function("slow_fn", PermissionBits::NONE, IsolationLevel::Process)
            .unwrap();
        let result = ctx.verify_access("slow_fn", "python", None).unwrap();
        assert!(!result.allowed);
        assert_eq!(result.reason, Some(DenialReason::IsolationViolation));
    }

    #[test]
    fn operations_fail_outside_active_state() {
        let ctx = SecurityContext::new(SecurityPolicy::default(), 16);
        ctx.begin_terminating().unwrap();
        let err = ctx.verify_access("f", "python", None).unwrap_err();
        assert!(matches!(err, PolyCallError::InvalidState(_)));
    }
}
