// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use polycall_types::{PermissionBits, PolyCallError, Result};

use crate::region::{Borrower, MemoryRegion, RegionHandle};

/// Invoked by the bridge to ask a language whether a region it borrowed
/// is reclaimable from that language's perspective. Returns `true` when
/// the language confirms it holds no more live references, at which
/// point the bridge removes that language's borrow.
pub type GcNotifier = dyn Fn(RegionHandle) -> bool + Send + Sync;

/// What a `release` call actually did, so the caller (the security
/// layer, in the forced case) can decide whether to audit it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseOutcome {
    pub freed: bool,
    pub forced: bool,
    pub invalidated_borrowers: usize,
}

struct Inner {
    regions: HashMap<RegionHandle, MemoryRegion>,
    pool_used: usize,
}

/// The cross-language memory bridge (C2): a process-wide region index
/// guarded by a single lock, reference counting separated from borrow
/// tracking so cycles between borrowers never affect the owner's count.
pub struct MemoryBridge {
    inner: RwLock<Inner>,
    next_handle: AtomicU64,
    pool_capacity: usize,
    gc_notifiers: RwLock<HashMap<String, Arc<GcNotifier>>>,
}

impl MemoryBridge {
    pub fn new(pool_capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                regions: HashMap::new(),
                pool_used: 0,
            }),
            next_handle: AtomicU64::new(1),
            pool_capacity,
            gc_notifiers: RwLock::new(HashMap::new()),
        }
    }

    pub fn acquire(
        &self,
        size: usize,
        alignment: usize,
        owner: &str,
        permissions: PermissionBits,
        sensitive: bool,
    ) -> Result<RegionHandle> {
        if size == 0 {
            return Err(PolyCallError::InvalidParameter(
                "region size must be non-zero".into(),
            ));
        }
        let mut inner = self.inner.write();
        if inner.pool_used + size > self.pool_capacity {
            return Err(PolyCallError::CapacityExceeded {
                resource: "memory_pool_size".into(),
            });
        }
        let handle = self.next_handle.fetch_add(1, Ordering::SeqCst);
        inner.regions.insert(
            handle,
            MemoryRegion::new(handle, size, alignment, owner, permissions, sensitive),
        );
        inner.pool_used += size;
        tracing::debug!(handle, size, owner, "acquired memory region");
        Ok(handle)
    }

    fn with_region_mut<T>(
        &self,
        handle: RegionHandle,
        f: impl FnOnce(&mut MemoryRegion) -> Result<T>,
    ) -> Result<T> {
        let mut inner = self.inner.write();
        let region = inner
            .regions
            .get_mut(&handle)
            .ok_or_else(|| PolyCallError::NotFound {
                kind: polycall_types::NotFoundKind::Region,
                name: handle.to_string(),
            })?;
        f(region)
    }

    pub fn incref(&self, handle: RegionHandle) -> Result<usize> {
        self.with_region_mut(handle, |r| {
            r.refcount += 1;
            Ok(r.refcount)
        })
    }

    pub fn decref(&self, handle: RegionHandle) -> Result<usize> {
        self.with_region_mut(handle, |r| {
            r.refcount = r.refcount.saturating_sub(1);
            Ok(r.refcount)
        })
    }

    /// Adds a borrower with `requested` permissions, which must be a
    /// subset of the region owner's permissions. Sharing bumps the
    /// refcount (the invariant `refcount >= 1` while any borrower exists
    /// holds from the moment the first borrow is added).
    pub fn add_borrower(
        &self,
        handle: RegionHandle,
        label: &str,
        requested: PermissionBits,
    ) -> Result<()> {
        self.with_region_mut(handle, |region| {
            if !requested.is_subset_of(region.permissions) {
                return Err(PolyCallError::PermissionEscalation {
                    requested,
                    owner: region.permissions,
                });
            }
            region.shared = true;
            region.refcount += 1;
            region.borrowers.push(Borrower {
                label: label.to_string(),
                permissions: requested,
            });
            tracing::debug!(handle, borrower = label, "granted region borrow");
            Ok(())
        })
    }

    pub fn remove_borrower(&self, handle: RegionHandle, label: &str) -> Result<()> {
        self.with_region_mut(handle, |region| {
            let before = region.borrowers.len();
            region.borrowers.retain(|b| b.label != label);
            if region.borrowers.len() < before {
                region.refcount = region.refcount.saturating_sub(1);
            }
            Ok(())
        })
    }

    pub fn query(&self, handle: RegionHandle) -> Result<MemoryRegion> {
        let inner = self.inner.read();
        inner
            .regions
            .get(&handle)
            .cloned()
            .ok_or_else(|| PolyCallError::NotFound {
                kind: polycall_types::NotFoundKind::Region,
                name: handle.to_string(),
            })
    }

    /// Releases the owner's hold on `handle`. Succeeds (freeing the
    /// region) only when the refcount is zero and no borrower is live,
    /// unless `force` is supplied, in which case all borrowers are
    /// invalidated unconditionally and the region is freed regardless.
    pub fn release(&self, handle: RegionHandle, force: bool) -> Result<ReleaseOutcome> {
        let mut inner = self.inner.write();
        let region = inner
            .regions
            .get(&handle)
            .ok_or_else(|| PolyCallError::NotFound {
                kind: polycall_types::NotFoundKind::Region,
                name: handle.to_string(),
            })?;

        if !region.is_releasable() && !force {
            return Err(PolyCallError::StillBorrowed(region.borrowers.len()));
        }

        let invalidated = region.borrowers.len();
        let size = region.size;
        inner.regions.remove(&handle);
        inner.pool_used = inner.pool_used.saturating_sub(size);
        tracing::debug!(handle, forced = force, "released memory region");
        Ok(ReleaseOutcome {
            freed: true,
            forced: force && invalidated > 0,
            invalidated_borrowers: invalidated,
        })
    }

    pub fn register_gc_notifier(
        &self,
        language: &str,
        notifier: impl Fn(RegionHandle) -> bool + Send + Sync + 'static,
    ) {
        self.gc_notifiers
            .write()
            .insert(language.to_string(), Arc::new(notifier));
    }

    /// Asks every language with a registered notifier whether its
    /// borrows are reclaimable, and drops the borrows it confirms.
    /// Notifiers are invoked with no lock held, per the §4.2/§5 rule
    /// that the bridge never calls back into a language while holding
    /// its own lock.
    pub fn run_gc_sweep(&self) -> Vec<(RegionHandle, String)> {
        let candidates: Vec<(RegionHandle, String, Arc<GcNotifier>)> = {
            let inner = self.inner.read();
            let notifiers = self.gc_notifiers.read();
            inner
                .regions
                .values()
                .flat_map(|region| {
                    region.borrowers.iter().filter_map(|b| {
                        notifiers
                            .get(&b.label)
                            .map(|n| (region.handle, b.label.clone(), Arc::clone(n)))
                    })
                })
                .collect()
        };

        let mut reclaimed = Vec::new();
        for (handle, label, notifier) in candidates {
            if notifier(handle) {
                if self.remove_borrower(handle, &label).is_ok() {
                    reclaimed.push((handle, label));
                }
            }
        }
        reclaimed
    }

    pub fn pool_used(&self) -> usize {
        self.inner.read().pool_used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_size_acquire_fails() {
        let bridge = MemoryBridge::new(4096);
        let err = bridge
            .acquire(0, 8, "lang-a", PermissionBits::READ, false)
            .unwrap_err();
        assert!(matches!(err, PolyCallError::InvalidParameter(_)));
    }

    #[test]
    fn capacity_exceeded_without_mutation() {
        let bridge = MemoryBridge::new(1024);
        let err = bridge
            .acquire(2048, 8, "lang-a", PermissionBits::READ, false)
            .unwrap_err();
        assert!(matches!(err, PolyCallError::CapacityExceeded { .. }));
        assert_eq!(bridge.pool_used(), 0);
    }

    #[test]
    fn borrower_permissions_are_intersected_not_extended() {
        let bridge = MemoryBridge::new(4096);
        let handle = bridge
            .acquire(
                1024,
                8,
                "lang-a",
                PermissionBits::READ | PermissionBits::WRITE | PermissionBits::SHARE,
                false,
            )
            .unwrap();
        bridge
            .add_borrower(handle, "lang-b", PermissionBits::READ)
            .unwrap();
        let region = bridge.query(handle).unwrap();
        assert_eq!(region.borrower("lang-b").unwrap().permissions, PermissionBits::READ);

        let err = bridge
            .add_borrower(handle, "lang-c", PermissionBits::WRITE | PermissionBits::ADMIN)
            .unwrap_err();
        assert!(matches!(err, PolyCallError::PermissionEscalation { .. }));
    }

    #[test]
    fn release_fails_with_live_borrowers_unless_forced() {
        let bridge = MemoryBridge::new(4096);
        let handle = bridge
            .acquire(1024, 8, "lang-a", PermissionBits::READ | PermissionBits::SHARE, false)
            .unwrap();
        bridge
            .add_borrower(handle, "lang-b", PermissionBits::READ)
            .unwrap();

        let err = bridge.release(handle, false).unwrap_err();
        assert!(matches!(err, PolyCallError::StillBorrowed(1)));

        let outcome = bridge.release(handle, true).unwrap();
        assert!(outcome.freed);
        assert!(outcome.forced);
        assert_eq!(outcome.invalidated_borrowers, 1);
        assert!(bridge.query(handle).is_err());
    }

    #[test]
    fn full_share_release_cycle_frees_region() {
        let bridge = MemoryBridge::new(4096);
        let handle = bridge
            .acquire(1024, 8, "lang-a", PermissionBits::READ | PermissionBits::SHARE, false)
            .unwrap();
        bridge
            .add_borrower(handle, "lang-b", PermissionBits::READ)
            .unwrap();
        bridge.remove_borrower(handle, "lang-b").unwrap();
        bridge.decref(handle).unwrap();
        let region = bridge.query(handle).unwrap();
        assert!(region.is_releasable());
        let outcome = bridge.release(handle, false).unwrap();
        assert!(outcome.freed);
        assert!(!outcome.forced);
    }

    #[test]
    fn gc_sweep_reclaims_confirmed_borrows_without_holding_lock() {
        let bridge = MemoryBridge::new(4096);
        let handle = bridge
            .acquire(1024, 8, "lang-a", PermissionBits::READ | PermissionBits::SHARE, false)
            .unwrap();
        bridge
            .add_borrower(handle, "lang-b", PermissionBits::READ)
            .unwrap();
        bridge.register_gc_notifier("lang-b", |_| true);
        let reclaimed = bridge.run_gc_sweep();
        assert_eq!(reclaimed, vec![(handle, "lang-b".to_string())]);
        let region = bridge.query(handle).unwrap();
        assert!(region.borrower("lang-b").is_none());
    }
}
