// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use polycall_types::PermissionBits;

/// Stable handle identifying a region in the bridge's process-wide
/// index. Never reused: a freed region's handle is retired, not
/// recycled, so a stale handle always resolves to `NotFound` rather than
/// a different, newer region.
pub type RegionHandle = u64;

/// A borrower holding a (possibly reduced) subset of a region's
/// permissions. Borrower permissions are always intersected, never
/// extended, against the owner's (§4.2).
#[derive(Debug, Clone)]
pub struct Borrower {
    pub label: String,
    pub permissions: PermissionBits,
}

/// A bounded block of memory the bridge manages with reference counting
/// and borrow tracking (§3). The owner's reference count is tracked
/// separately from the list of borrowers so that cycles between
/// borrowers never affect it.
#[derive(Debug, Clone)]
pub struct MemoryRegion {
    pub handle: RegionHandle,
    pub size: usize,
    pub alignment: usize,
    pub owner: String,
    pub permissions: PermissionBits,
    pub refcount: usize,
    pub shared: bool,
    pub sensitive: bool,
    pub borrowers: Vec<Borrower>,
}

impl MemoryRegion {
    pub fn new(
        handle: RegionHandle,
        size: usize,
        alignment: usize,
        owner: impl Into<String>,
        permissions: PermissionBits,
        sensitive: bool,
    ) -> Self {
        Self {
            handle,
            size,
            alignment,
            owner: owner.into(),
            permissions,
            refcount: 1,
            shared: false,
            sensitive,
            borrowers: Vec::new(),
        }
    }

    pub fn is_releasable(&self) -> bool {
        self.refcount == 0 && self.borrowers.is_empty()
    }

    pub fn borrower(&self, label: &str) -> Option<&Borrower> {
        self.borrowers.iter().find(|b| b.label == label)
    }
}
