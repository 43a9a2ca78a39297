// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Capability flags controlling what an actor (a function, a memory
/// borrower, a caller language) may do. Stored as a bitset so checks and
/// intersections are single machine instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PermissionBits(u16);

impl PermissionBits {
    pub const NONE: PermissionBits = PermissionBits(0);
    pub const READ: PermissionBits = PermissionBits(1 << 0);
    pub const WRITE: PermissionBits = PermissionBits(1 << 1);
    pub const EXECUTE: PermissionBits = PermissionBits(1 << 2);
    pub const SHARE: PermissionBits = PermissionBits(1 << 3);
    pub const IO: PermissionBits = PermissionBits(1 << 4);
    pub const NETWORK: PermissionBits = PermissionBits(1 << 5);
    pub const FS: PermissionBits = PermissionBits(1 << 6);
    pub const ADMIN: PermissionBits = PermissionBits(1 << 7);

    pub const ALL: PermissionBits = PermissionBits(0x00FF);

    pub fn bits(self) -> u16 {
        self.0
    }

    pub fn from_bits(bits: u16) -> Self {
        PermissionBits(bits & Self::ALL.0)
    }

    pub fn union(self, other: PermissionBits) -> PermissionBits {
        PermissionBits(self.0 | other.0)
    }

    pub fn intersection(self, other: PermissionBits) -> PermissionBits {
        PermissionBits(self.0 & other.0)
    }

    /// `true` iff every bit set in `self` is also set in `superset`.
    pub fn is_subset_of(self, superset: PermissionBits) -> bool {
        self.0 & !superset.0 == 0
    }

    pub fn contains(self, flag: PermissionBits) -> bool {
        self.0 & flag.0 == flag.0
    }

    /// Permissions present in `self` but missing from `available`, used to
    /// report `missing_permissions` on an access denial.
    pub fn missing_from(self, available: PermissionBits) -> PermissionBits {
        PermissionBits(self.0 & !available.0)
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Single-flag names, for the resource tags used by the security
    /// policy's `permissions` table (§6) and for diagnostics.
    pub fn name(self) -> Option<&'static str> {
        match self {
            PermissionBits::READ => Some("memory_read"),
            PermissionBits::WRITE => Some("memory_write"),
            PermissionBits::EXECUTE => Some("execute"),
            PermissionBits::SHARE => Some("share"),
            PermissionBits::IO => Some("io"),
            PermissionBits::NETWORK => Some("network"),
            PermissionBits::FS => Some("fs"),
            PermissionBits::ADMIN => Some("admin"),
            _ => None,
        }
    }

    pub fn from_name(name: &str) -> Option<PermissionBits> {
        match name {
            "memory_read" => Some(PermissionBits::READ),
            "memory_write" => Some(PermissionBits::WRITE),
            "execute" => Some(PermissionBits::EXECUTE),
            "share" => Some(PermissionBits::SHARE),
            "io" => Some(PermissionBits::IO),
            "network" => Some(PermissionBits::NETWORK),
            "fs" => Some(PermissionBits::FS),
            "admin" => Some(PermissionBits::ADMIN),
            _ => None,
        }
    }
}

impl std::ops::BitOr for PermissionBits {
    type Output = PermissionBits;
    fn bitor(self, rhs: Self) -> Self::Output {
        self.union(rhs)
    }
}

impl std::ops::BitAnd for PermissionBits {
    type Output = PermissionBits;
    fn bitand(self, rhs: Self) -> Self::Output {
        self.intersection(rhs)
    }
}

impl Default for PermissionBits {
    fn default() -> Self {
        PermissionBits::NONE
    }
}

impl fmt::Display for PermissionBits {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = [
            PermissionBits::READ,
            PermissionBits::WRITE,
            PermissionBits::EXECUTE,
            PermissionBits::SHARE,
            PermissionBits::IO,
            PermissionBits::NETWORK,
            PermissionBits::FS,
            PermissionBits::ADMIN,
        ]
        .iter()
        .filter(|flag| self.contains(**flag))
        .filter_map(|flag| flag.name())
        .collect::<Vec<_>>()
        .join("|");
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{names}")
        }
    }
}
