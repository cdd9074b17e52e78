//! Security audit log.
//!
//! # Data Flow
//! ```text
//! gate stage / portal handler
//!     → SecurityLogEntry::new(..)
//!     → AuditLog::append
//!         → bounded in-memory tail (viewer, dashboard)
//!         → sinks (JSON-lines file via a writer task), best-effort
//! ```
//!
//! Entries are immutable once appended. Memory holds only the most recent
//! `retained_entries`; the JSON-lines file is the complete record. A failing
//! sink is logged and counted, never surfaced to the request that produced
//! the entry.

pub mod sink;

use std::collections::VecDeque;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::UserId;
use crate::config::AuditConfig;
use crate::observability::metrics;

pub use sink::{read_jsonl, read_jsonl_tail, AuditSink, JsonlSink};

#[derive(Debug, Error)]
pub enum AuditError {
    #[error("audit IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("audit encoding error: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("audit writer needs a Tokio runtime: {0}")]
    Runtime(#[from] tokio::runtime::TryCurrentError),

    #[error("audit writer has stopped")]
    WriterClosed,
}

/// Kinds of security-relevant events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SecurityEventType {
    #[serde(rename = "LOGIN_SUCCESS")]
    LoginSuccess,
    #[serde(rename = "LOGIN_FAILED")]
    LoginFailed,
    #[serde(rename = "LOGIN_LOCKED")]
    LoginLocked,
    #[serde(rename = "LOGOUT")]
    Logout,
    #[serde(rename = "2FA_ENABLED")]
    TwoFactorEnabled,
    #[serde(rename = "2FA_DISABLED")]
    TwoFactorDisabled,
    #[serde(rename = "PASSWORD_CHANGED")]
    PasswordChanged,
    #[serde(rename = "UNAUTHORIZED_ACCESS")]
    UnauthorizedAccess,
    #[serde(rename = "SUSPICIOUS_ACTIVITY")]
    SuspiciousActivity,
    #[serde(rename = "EMERGENCY_ADMIN_ACCESS")]
    EmergencyAdminAccess,
    #[serde(rename = "SESSION_EXPIRED")]
    SessionExpired,
}

impl SecurityEventType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::LoginSuccess => "LOGIN_SUCCESS",
            Self::LoginFailed => "LOGIN_FAILED",
            Self::LoginLocked => "LOGIN_LOCKED",
            Self::Logout => "LOGOUT",
            Self::TwoFactorEnabled => "2FA_ENABLED",
            Self::TwoFactorDisabled => "2FA_DISABLED",
            Self::PasswordChanged => "PASSWORD_CHANGED",
            Self::UnauthorizedAccess => "UNAUTHORIZED_ACCESS",
            Self::SuspiciousActivity => "SUSPICIOUS_ACTIVITY",
            Self::EmergencyAdminAccess => "EMERGENCY_ADMIN_ACCESS",
            Self::SessionExpired => "SESSION_EXPIRED",
        }
    }
}

impl std::fmt::Display for SecurityEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityLogEntry {
    pub id: Uuid,
    pub user_id: Option<UserId>,
    pub event_type: SecurityEventType,
    pub ip_address: Option<IpAddr>,
    pub user_agent: String,
    pub details: Map<String, Value>,
    pub timestamp: DateTime<Utc>,
}

impl SecurityLogEntry {
    pub fn new(event_type: SecurityEventType, ip_address: Option<IpAddr>, user_agent: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: None,
            event_type,
            ip_address,
            user_agent: user_agent.to_string(),
            details: Map::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn with_user(mut self, user_id: UserId) -> Self {
        self.user_id = Some(user_id);
        self
    }

    pub fn with_detail(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.details.insert(key.to_string(), value.into());
        self
    }
}

/// Append-only security log with optional durable sinks.
pub struct AuditLog {
    entries: RwLock<VecDeque<SecurityLogEntry>>,
    capacity: usize,
    sinks: Vec<Box<dyn AuditSink>>,
}

impl Default for AuditLog {
    fn default() -> Self {
        Self::with_capacity(AuditConfig::default().retained_entries)
    }
}

impl AuditLog {
    /// A log that only lives in memory.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// An in-memory log holding at most `capacity` recent entries.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: RwLock::new(VecDeque::new()),
            capacity: capacity.max(1),
            sinks: Vec::new(),
        }
    }

    /// Build the log described by `config`, replaying the tail of any
    /// persisted entries.
    pub fn open(config: &AuditConfig) -> Result<Self, AuditError> {
        let mut log = Self::with_capacity(config.retained_entries);
        if let Some(path) = &config.persistence_path {
            let existing = read_jsonl_tail(path, log.capacity)?;
            tracing::info!(path = %path, entries = existing.len(), "Loaded security log");
            *log.entries.get_mut() = existing.into();
            log = log.with_sink(Box::new(JsonlSink::open(path)?));
        }
        Ok(log)
    }

    pub fn with_sink(mut self, sink: Box<dyn AuditSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    /// Append an entry. Sink failures are logged and swallowed.
    pub fn append(&self, entry: SecurityLogEntry) {
        let details = serde_json::Value::Object(entry.details.clone());
        tracing::info!(
            target: "admin_gate::audit",
            event = %entry.event_type,
            user_id = ?entry.user_id,
            ip = ?entry.ip_address,
            details = %details,
            "Security event"
        );

        for sink in &self.sinks {
            if let Err(e) = sink.write(&entry) {
                tracing::warn!(error = %e, event = %entry.event_type, "Failed to persist security event");
                metrics::record_audit_write_failure();
            }
        }

        let mut entries = self.entries.write();
        if entries.len() == self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    /// Most recent entries, newest first.
    pub fn recent(&self, limit: usize) -> Vec<SecurityLogEntry> {
        self.entries.read().iter().rev().take(limit).cloned().collect()
    }

    /// Entries at or after `since`, newest first.
    pub fn since(&self, since: DateTime<Utc>, limit: usize) -> Vec<SecurityLogEntry> {
        self.entries
            .read()
            .iter()
            .rev()
            .take_while(|e| e.timestamp >= since)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Retained entries of one type, oldest first.
    pub fn of_type(&self, event_type: SecurityEventType) -> Vec<SecurityLogEntry> {
        self.entries
            .read()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }

    /// Entries held in memory.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingSink;

    impl AuditSink for FailingSink {
        fn write(&self, _entry: &SecurityLogEntry) -> Result<(), AuditError> {
            Err(AuditError::Io(std::io::Error::other("disk full")))
        }
    }

    #[test]
    fn test_event_type_wire_names() {
        let json = serde_json::to_string(&SecurityEventType::TwoFactorEnabled).unwrap();
        assert_eq!(json, "\"2FA_ENABLED\"");
        assert_eq!(SecurityEventType::LoginLocked.to_string(), "LOGIN_LOCKED");
    }

    #[test]
    fn test_sink_failure_does_not_lose_entry() {
        let log = AuditLog::in_memory().with_sink(Box::new(FailingSink));
        log.append(
            SecurityLogEntry::new(SecurityEventType::LoginFailed, None, "curl/8")
                .with_detail("username", "admin"),
        );

        assert_eq!(log.len(), 1);
        assert_eq!(log.recent(10)[0].details["username"], "admin");
    }

    #[test]
    fn test_recent_is_newest_first() {
        let log = AuditLog::in_memory();
        log.append(SecurityLogEntry::new(SecurityEventType::LoginFailed, None, ""));
        log.append(SecurityLogEntry::new(SecurityEventType::LoginSuccess, None, "").with_user(3));

        let recent = log.recent(1);
        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].event_type, SecurityEventType::LoginSuccess);
        assert_eq!(recent[0].user_id, Some(3));
        assert_eq!(log.since(Utc::now() - chrono::Duration::days(7), 10).len(), 2);
        assert_eq!(log.of_type(SecurityEventType::LoginFailed).len(), 1);
    }

    #[test]
    fn test_memory_holds_a_bounded_tail() {
        let log = AuditLog::with_capacity(100);
        for attempt in 0..10_000 {
            log.append(
                SecurityLogEntry::new(SecurityEventType::UnauthorizedAccess, None, "crawler")
                    .with_detail("attempt", attempt),
            );
        }

        assert_eq!(log.len(), 100);
        assert_eq!(log.recent(1)[0].details["attempt"], 9_999);
        assert_eq!(log.of_type(SecurityEventType::UnauthorizedAccess)[0].details["attempt"], 9_900);
    }
}
