// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::collections::{HashMap, VecDeque};

use parking_lot::RwLock;
use polycall_types::CanonicalValue;

/// Deterministic cache key: function name plus the ordered fingerprint
/// bytes of every argument. `None` when any argument is not cacheable
/// (composite/shared-region handles, §4.5) — such calls never hit.
pub fn fingerprint(function: &str, args: &[CanonicalValue]) -> Option<Vec<u8>> {
    if args.iter().any(|a| !a.is_cacheable()) {
        return None;
    }
    let mut bytes = Vec::new();
    bytes.extend_from_slice(&(function.len() as u64).to_le_bytes());
    bytes.extend_from_slice(function.as_bytes());
    for arg in args {
        let fp = arg.fingerprint_bytes();
        bytes.extend_from_slice(&(fp.len() as u64).to_le_bytes());
        bytes.extend_from_slice(&fp);
    }
    Some(bytes)
}

struct CacheEntry {
    function: String,
    generation: u64,
    result: CanonicalValue,
}

struct Inner {
    entries: HashMap<Vec<u8>, CacheEntry>,
    /// Least-recently-used order, oldest at the front.
    order: VecDeque<Vec<u8>>,
    generations: HashMap<String, u64>,
}

/// The result cache keyed by function + argument fingerprint (§4.5).
/// Generation counters bump on re-registration, invalidating every entry
/// for that function without a full sweep; capacity overflow evicts the
/// least-recently-used entry.
pub struct PerformanceCache {
    capacity: usize,
    inner: RwLock<Inner>,
}

impl PerformanceCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            inner: RwLock::new(Inner {
                entries: HashMap::new(),
                order: VecDeque::new(),
                generations: HashMap::new(),
            }),
        }
    }

    fn current_generation(inner: &Inner, function: &str) -> u64 {
        inner.generations.get(function).copied().unwrap_or(0)
    }

    /// Looks up `key`, returning `None` on a miss or on a stale
    /// generation. A hit touches the LRU order.
    pub fn get(&self, function: &str, key: &[u8]) -> Option<CanonicalValue> {
        let mut inner = self.inner.write();
        let current_gen = Self::current_generation(&inner, function);
        let hit = match inner.entries.get(key) {
            Some(entry) if entry.generation == current_gen => Some(entry.result.clone()),
            _ => None,
        };
        if hit.is_some() {
            if let Some(pos) = inner.order.iter().position(|k| k == key) {
                let k = inner.order.remove(pos).unwrap();
                inner.order.push_back(k);
            }
        }
        hit
    }

    pub fn store(&self, function: &str, key: Vec<u8>, result: CanonicalValue) {
        let mut inner = self.inner.write();
        let generation = Self::current_generation(&inner, function);
        if !inner.entries.contains_key(&key) {
            inner.order.push_back(key.clone());
        }
        inner.entries.insert(
            key,
            CacheEntry {
                function: function.to_string(),
                generation,
                result,
            },
        );
        while inner.order.len() > self.capacity {
            if let Some(evicted) = inner.order.pop_front() {
                inner.entries.remove(&evicted);
            }
        }
    }

    /// Invalidates every cached entry for `function` by advancing its
    /// generation counter — called when the function is re-registered.
    pub fn bump_generation(&self, function: &str) {
        let mut inner = self.inner.write();
        *inner.generations.entry(function.to_string()).or_insert(0) += 1;
        tracing::debug!(function, "cache generation bumped");
    }

    pub fn len(&self) -> usize {
        self.inner.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Visible for tests: whether the cached entry for `function`
    /// carrying the given fingerprint key is the one currently served.
    pub fn contains(&self, key: &[u8]) -> bool {
        self.inner.read().entries.contains_key(key)
    }
}
