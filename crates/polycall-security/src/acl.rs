// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use serde::{Deserialize, Serialize};

use polycall_types::PermissionBits;

/// A single field pattern in an ACL entry. `*` matches anything; any
/// other string matches itself exactly. Globbing beyond the single
/// wildcard token is deliberately unsupported (§9 Open Questions).
fn pattern_matches(pattern: &str, value: &str) -> bool {
    pattern == "*" || pattern == value
}

/// One entry in the function-access control list (§3). Entries are
/// evaluated in declaration order; the first enabled match wins.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AclEntry {
    pub function_pattern: String,
    pub caller_pattern: String,
    #[serde(default)]
    pub context_pattern: Option<String>,
    #[serde(with = "permission_bits_serde")]
    pub required: PermissionBits,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

fn default_true() -> bool {
    true
}

impl AclEntry {
    pub fn new(
        function_pattern: impl Into<String>,
        caller_pattern: impl Into<String>,
        required: PermissionBits,
    ) -> Self {
        Self {
            function_pattern: function_pattern.into(),
            caller_pattern: caller_pattern.into(),
            context_pattern: None,
            required,
            enabled: true,
        }
    }

    pub fn with_context(mut self, context_pattern: impl Into<String>) -> Self {
        self.context_pattern = Some(context_pattern.into());
        self
    }

    pub fn matches(&self, function: &str, caller_lang: &str, caller_context: Option<&str>) -> bool {
        if !self.enabled {
            return false;
        }
        if !pattern_matches(&self.function_pattern, function) {
            return false;
        }
        if !pattern_matches(&self.caller_pattern, caller_lang) {
            return false;
        }
        match (&self.context_pattern, caller_context) {
            (None, _) => true,
            (Some(pattern), Some(context)) => pattern_matches(pattern, context),
            (Some(_), None) => false,
        }
    }
}

/// Finds the first enabled ACL entry matching `(function, caller_lang,
/// caller_context)`, preserving declaration order (first-match
/// semantics, §4.3).
pub fn first_match<'a>(
    entries: &'a [AclEntry],
    function: &str,
    caller_lang: &str,
    caller_context: Option<&str>,
) -> Option<&'a AclEntry> {
    entries
        .iter()
        .find(|entry| entry.matches(function, caller_lang, caller_context))
}

mod permission_bits_serde {
    use polycall_types::PermissionBits;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(bits: &PermissionBits, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u16(bits.bits())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<PermissionBits, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = u16::deserialize(deserializer)?;
        Ok(PermissionBits::from_bits(bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_anything() {
        let entry = AclEntry::new("secret", "*", PermissionBits::ADMIN);
        assert!(entry.matches("secret", "python", None));
        assert!(entry.matches("secret", "jvm", None));
        assert!(!entry.matches("other", "python", None));
    }

    #[test]
    fn first_match_wins_in_declaration_order() {
        let entries = vec![
            AclEntry::new("secret", "python", PermissionBits::READ),
            AclEntry::new("secret", "*", PermissionBits::ADMIN),
        ];
        let found = first_match(&entries, "secret", "python", None).unwrap();
        assert_eq!(found.required, PermissionBits::READ);
    }

    #[test]
    fn disabled_entries_never_match() {
        let mut entry = AclEntry::new("secret", "*", PermissionBits::ADMIN);
        entry.enabled = false;
        assert!(!entry.matches("secret", "python", None));
    }

    #[test]
    fn context_pattern_requires_caller_context() {
        let entry = AclEntry::new("secret", "*", PermissionBits::ADMIN).with_context("restricted");
        assert!(!entry.matches("secret", "python", None));
        assert!(entry.matches("secret", "python", Some("restricted")));
        assert!(!entry.matches("secret", "python", Some("other")));
    }
}
