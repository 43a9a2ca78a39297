// Copyright (c) 2026 LibPolyCall Authors, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions,
// more details in file LICENSE and CONTRIBUTING.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use polycall_types::PermissionBits;
use serde::Serialize;

/// What an audited operation was doing (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    AccessCheck,
    Call,
    Register,
    Unregister,
    Share,
    Release,
    PolicyViolation,
    PrivilegeEscalation,
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ActionKind::AccessCheck => "access_check",
            ActionKind::Call => "call",
            ActionKind::Register => "register",
            ActionKind::Unregister => "unregister",
            ActionKind::Share => "share",
            ActionKind::Release => "release",
            ActionKind::PolicyViolation => "policy_violation",
            ActionKind::PrivilegeEscalation => "privilege_escalation",
        };
        write!(f, "{s}")
    }
}

/// One entry in the audit ring buffer (§3). `missing_permissions` is
/// populated only for denied `access_check`/`call` events.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    pub timestamp: DateTime<Utc>,
    pub source_language: String,
    pub target_language: String,
    pub function_name: String,
    pub action: ActionKind,
    pub allowed: bool,
    pub missing_permissions: PermissionBits,
    pub detail: Option<String>,
}

impl AuditEvent {
    pub fn new(
        source_language: impl Into<String>,
        target_language: impl Into<String>,
        function_name: impl Into<String>,
        action: ActionKind,
        allowed: bool,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            source_language: source_language.into(),
            target_language: target_language.into(),
            function_name: function_name.into(),
            action,
            allowed,
            missing_permissions: PermissionBits::NONE,
            detail: None,
        }
    }

    pub fn with_missing(mut self, missing: PermissionBits) -> Self {
        self.missing_permissions = missing;
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// One line per event per §6: ISO-8601 timestamp, source → target,
    /// function, action, ALLOWED/DENIED, optional detail.
    pub fn to_line(&self) -> String {
        let result = if self.allowed { "ALLOWED" } else { "DENIED" };
        let mut line = format!(
            "{} {} → {} | {} | {} | {}",
            self.timestamp.to_rfc3339(),
            self.source_language,
            self.target_language,
            self.function_name,
            self.action,
            result,
        );
        if let Some(detail) = &self.detail {
            line.push_str(" | ");
            line.push_str(detail);
        }
        line
    }

    /// JSON rendering of this event, for embedders who prefer structured
    /// log ingestion over the plain-text `to_line()` format (§6).
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).expect("AuditEvent fields are all JSON-serializable")
    }
}

pub type AuditCallback = dyn Fn(&AuditEvent) + Send + Sync;

struct Ring {
    buf: Vec<AuditEvent>,
    capacity: usize,
    next: usize,
    len: usize,
}

impl Ring {
    fn new(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
            capacity: capacity.max(1),
            next: 0,
            len: 0,
        }
    }

    fn push(&mut self, event: AuditEvent) {
        if self.buf.len() < self.capacity {
            self.buf.push(event);
        } else {
            self.buf[self.next] = event;
        }
        self.next = (self.next + 1) % self.capacity;
        self.len = (self.len + 1).min(self.capacity);
    }

    /// Oldest-first snapshot of the currently retained events.
    fn snapshot(&self) -> Vec<AuditEvent> {
        if self.buf.len() < self.capacity {
            self.buf.clone()
        } else {
            let mut out = Vec::with_capacity(self.capacity);
            out.extend_from_slice(&self.buf[self.next..]);
            out.extend_from_slice(&self.buf[..self.next]);
            out
        }
    }
}

/// A lock-guarded fixed-size ring buffer of audit events (§3, §5), with
/// independent console/file sinks and an optional external callback
/// invoked after the ring's lock is released so the callback may safely
/// re-enter the security layer.
pub struct AuditLog {
    ring: Mutex<Ring>,
    console_enabled: bool,
    file_path: RwLock<Option<PathBuf>>,
    callback: RwLock<Option<Arc<AuditCallback>>>,
}

impl AuditLog {
    pub fn new(capacity: usize, console_enabled: bool) -> Self {
        Self {
            ring: Mutex::new(Ring::new(capacity)),
            console_enabled,
            file_path: RwLock::new(None),
            callback: RwLock::new(None),
        }
    }

    pub fn set_file_sink(&self, path: impl AsRef<Path>) {
        *self.file_path.write() = Some(path.as_ref().to_path_buf());
    }

    pub fn install_callback(&self, callback: impl Fn(&AuditEvent) + Send + Sync + 'static) {
        *self.callback.write() = Some(Arc::new(callback));
    }

    /// Records `event` in the ring, then mirrors it to the console/file
    /// sinks, then invokes the external callback — the lock over the
    /// ring is held only for the `push`.
    pub fn record(&self, event: AuditEvent) {
        if self.console_enabled {
            match event.allowed {
                true => tracing::info!(target: "polycall.audit", "{}", event.to_line()),
                false => tracing::warn!(target: "polycall.audit", "{}", event.to_line()),
            }
        }

        {
            let mut ring = self.ring.lock();
            ring.push(event.clone());
        }

        if let Some(path) = self.file_path.read().clone() {
            if let Err(err) = append_to_file(&path, &event.to_line()) {
                tracing::error!(path = %path.display(), error = %err, "failed to write audit file sink");
            }
        }

        let callback = self.callback.read().clone();
        if let Some(callback) = callback {
            callback(&event);
        }
    }

    pub fn snapshot(&self) -> Vec<AuditEvent> {
        self.ring.lock().snapshot()
    }

    pub fn len(&self) -> usize {
        self.ring.lock().len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn append_to_file(path: &Path, line: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    writeln!(file, "{line}")?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ring_overwrites_oldest_entry_once_full() {
        let log = AuditLog::new(2, false);
        log.record(AuditEvent::new("a", "b", "f1", ActionKind::Call, true));
        log.record(AuditEvent::new("a", "b", "f2", ActionKind::Call, true));
        log.record(AuditEvent::new("a", "b", "f3", ActionKind::Call, true));
        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].function_name, "f2");
        assert_eq!(snapshot[1].function_name, "f3");
    }

    #[test]
    fn denied_event_carries_missing_permissions() {
        let log = AuditLog::new(4, false);
        log.record(
            AuditEvent::new("python", "native", "secret", ActionKind::AccessCheck, false)
                .with_missing(PermissionBits::ADMIN),
        );
        let snapshot = log.snapshot();
        assert_eq!(snapshot.len(), 1);
        assert!(!snapshot[0].allowed);
        assert_eq!(snapshot[0].missing_permissions, PermissionBits::ADMIN);
    }

    #[test]
    fn file_sink_appends_one_line_per_event() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.log");
        let log = AuditLog::new(8, false);
        log.set_file_sink(&path);
        log.record(AuditEvent::new("a", "b", "secret", ActionKind::Call, false));
        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents.lines().count(), 1);
        assert!(contents.contains("secret"));
        assert!(contents.contains("DENIED"));
    }

    #[test]
    fn callback_runs_after_lock_release_and_can_reenter() {
        let log = Arc::new(AuditLog::new(8, false));
        let observed = Arc::new(Mutex::new(Vec::new()));
        let log_for_cb = Arc::clone(&log);
        let observed_for_cb = Arc::clone(&observed);
        log.install_callback(move |event| {
            observed_for_cb.lock().push(event.function_name.clone());
            // Re-entering record() here would deadlock if invoked while
            // the ring's lock were still held.
            if event.function_name == "first" {
                log_for_cb.record(AuditEvent::new("a", "b", "second", ActionKind::Call, true));
            }
        });
        log.record(AuditEvent::new("a", "b", "first", ActionKind::Call, true));
        assert_eq!(*observed.lock(), vec!["first".to_string(), "second".to_string()]);
    }
}
