// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use serde::{Deserialize, Serialize};

/// The degree to which a function's execution is separated from the
/// caller's runtime state. Ordered: `None < Shared < Function < Module <
/// Process`. Declared per function at registration; the effective level
/// of a call is the max of caller's and callee's declarations (§4.3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationLevel {
    None,
    Shared,
    Function,
    Module,
    Process,
}

impl IsolationLevel {
    pub fn effective(self, other: IsolationLevel) -> IsolationLevel {
        self.max(other)
    }
}

impl Default for IsolationLevel {
    fn default() -> Self {
        IsolationLevel::Function
    }
}

impl std::str::FromStr for IsolationLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(IsolationLevel::None),
            "shared" => Ok(IsolationLevel::Shared),
            "function" => Ok(IsolationLevel::Function),
            "module" => Ok(IsolationLevel::Module),
            "process" => Ok(IsolationLevel::Process),
            other => Err(format!("unknown isolation level: {other}")),
        }
    }
}

impl std::fmt::Display for IsolationLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            IsolationLevel::None => "none",
            IsolationLevel::Shared => "shared",
            IsolationLevel::Function => "function",
            IsolationLevel::Module => "module",
            IsolationLevel::Process => "process",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_matches_spec() {
        assert!(IsolationLevel::None < IsolationLevel::Shared);
        assert!(IsolationLevel::Shared < IsolationLevel::Function);
        assert!(IsolationLevel::Function < IsolationLevel::Module);
        assert!(IsolationLevel::Module < IsolationLevel::Process);
    }

    #[test]
    fn effective_is_max_of_caller_and_callee() {
        assert_eq!(
            IsolationLevel::Shared.effective(IsolationLevel::Process),
            IsolationLevel::Process
        );
    }
}
