// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread::ThreadId;

use parking_lot::Mutex;

/// A queued call awaiting `execute_batch`. `submitting_thread` is kept so
/// the executor can preserve the submitting thread's adapter-lock
/// affinity for non-thread-safe adapters (§9 Open Questions resolution).
pub struct BatchSubmission<T> {
    pub id: u64,
    pub submitting_thread: ThreadId,
    pub payload: T,
}

/// A FIFO queue of calls awaiting batched dispatch (§4.5). Submissions
/// may be withdrawn any time before `execute_batch` drains the queue;
/// once drained, a call's failure never aborts the rest of the batch —
/// that's enforced by the caller's `dispatch` closure returning a
/// per-item `Result` rather than a batch-wide one.
pub struct BatchQueue<T> {
    next_id: AtomicU64,
    queue: Mutex<VecDeque<BatchSubmission<T>>>,
}

impl<T> BatchQueue<T> {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            queue: Mutex::new(VecDeque::new()),
        }
    }

    /// Enqueues `payload`, returning a submission id usable with
    /// `withdraw`.
    pub fn submit(&self, payload: T) -> u64 {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.queue.lock().push_back(BatchSubmission {
            id,
            submitting_thread: std::thread::current().id(),
            payload,
        });
        id
    }

    /// Removes a not-yet-executed submission. Returns `false` if the id
    /// is unknown or already drained by a concurrent `execute_batch`.
    pub fn withdraw(&self, id: u64) -> bool {
        let mut queue = self.queue.lock();
        let before = queue.len();
        queue.retain(|s| s.id != id);
        queue.len() < before
    }

    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drains the queue in submission order and runs `dispatch` on each
    /// payload, returning `(id, result)` pairs in the same order. A
    /// dispatch that itself fails is carried in `R` (typically a
    /// `Result`) rather than short-circuiting the batch.
    pub fn execute_batch<R>(&self, mut dispatch: impl FnMut(ThreadId, T) -> R) -> Vec<(u64, R)> {
        let items: Vec<_> = {
            let mut queue = self.queue.lock();
            queue.drain(..).collect()
        };
        items
            .into_iter()
            .map(|item| (item.id, dispatch(item.submitting_thread, item.payload)))
            .collect()
    }
}

impl<T> Default for BatchQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}
