// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use polycall_types::{IsolationLevel, PolyCallError, Result};

use crate::acl::AclEntry;

/// Overall strictness band for a security context, configured at init
/// (§6). Also bounds the maximum isolation transition a call may make
/// (§4.3): a call whose effective isolation level exceeds this bound
/// fails with `IsolationViolation`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityLevel {
    None,
    Low,
    Medium,
    High,
    Maximum,
}

impl Default for SecurityLevel {
    fn default() -> Self {
        SecurityLevel::Medium
    }
}

impl SecurityLevel {
    pub fn max_isolation(self) -> IsolationLevel {
        match self {
            SecurityLevel::None => IsolationLevel::Process,
            SecurityLevel::Low => IsolationLevel::Shared,
            SecurityLevel::Medium => IsolationLevel::Function,
            SecurityLevel::High => IsolationLevel::Module,
            SecurityLevel::Maximum => IsolationLevel::Process,
        }
    }
}

impl std::str::FromStr for SecurityLevel {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "none" => Ok(SecurityLevel::None),
            "low" => Ok(SecurityLevel::Low),
            "medium" => Ok(SecurityLevel::Medium),
            "high" => Ok(SecurityLevel::High),
            "maximum" => Ok(SecurityLevel::Maximum),
            other => Err(format!("unknown security level: {other}")),
        }
    }
}

/// Verbosity at which audited events are additionally mirrored to the
/// console/file sinks (§6); the ring buffer itself always records every
/// audited event regardless of this setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuditLevel {
    None,
    Error,
    Warning,
    Info,
    Debug,
    Trace,
}

impl Default for AuditLevel {
    fn default() -> Self {
        AuditLevel::Error
    }
}

/// The structured security policy document (§6): isolation levels per
/// language, a permission table (resource tag to ordered language
/// list), and the ACL. Round-trips through TOML via `serde`; JSON
/// remains available for embedders who prefer it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityPolicy {
    #[serde(default)]
    pub security_level: SecurityLevel,
    #[serde(default = "default_deny_default")]
    pub default_deny: bool,
    #[serde(default)]
    pub audit_level: AuditLevel,
    #[serde(default)]
    pub isolation: HashMap<String, IsolationLevel>,
    #[serde(default)]
    pub permissions: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub acl: Vec<AclEntry>,
}

fn default_deny_default() -> bool {
    true
}

impl Default for SecurityPolicy {
    fn default() -> Self {
        Self {
            security_level: SecurityLevel::default(),
            default_deny: true,
            audit_level: AuditLevel::default(),
            isolation: HashMap::new(),
            permissions: HashMap::new(),
            acl: Vec::new(),
        }
    }
}

impl SecurityPolicy {
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| {
            PolyCallError::InvalidParameter(format!("failed to serialize security policy: {e}"))
        })
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| {
            PolyCallError::InvalidParameter(format!("failed to parse security policy: {e}"))
        })
    }

    /// The isolation level declared for `language`, or `Function` (the
    /// crate-wide default, matching `IsolationLevel::default()`) if the
    /// language has no explicit entry.
    pub fn isolation_for(&self, language: &str) -> IsolationLevel {
        self.isolation.get(language).copied().unwrap_or_default()
    }
}
