//! Live admin sessions and the session ledger.

use std::net::IpAddr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use uuid::Uuid;

use crate::auth::UserId;
use crate::store::cache::ExpiringCache;
use crate::store::StoreError;

/// Login state bound to a session cookie.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    pub key: String,
    pub user_id: UserId,
    /// Address the session is pinned to; `None` until first seen.
    pub pinned_ip: Option<IpAddr>,
    pub user_agent: String,
    pub created_at: DateTime<Utc>,
}

/// Live sessions plus their last-activity instants.
///
/// Activity lives in an [`ExpiringCache`] keyed by session key, as the
/// session-activity timestamp is shared mutable state across requests.
#[derive(Default)]
pub struct SessionStore {
    sessions: DashMap<String, Session>,
    activity: ExpiringCache<Instant>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an unpinned session for `user_id`. The session guard pins it
    /// on its first admin request.
    pub fn create(&self, user_id: UserId, user_agent: &str) -> Session {
        let session = Session {
            key: Uuid::new_v4().simple().to_string(),
            user_id,
            pinned_ip: None,
            user_agent: user_agent.to_string(),
            created_at: Utc::now(),
        };
        self.sessions.insert(session.key.clone(), session.clone());
        session
    }

    pub fn get(&self, key: &str) -> Option<Session> {
        self.sessions.get(key).map(|s| s.value().clone())
    }

    /// Pin a fresh session to the address it was first seen from.
    pub fn pin(&self, key: &str, ip: IpAddr) -> Option<Session> {
        let mut session = self.sessions.get_mut(key)?;
        session.pinned_ip.get_or_insert(ip);
        Some(session.clone())
    }

    /// Record activity now. The cache entry outlives the idle timeout so
    /// that the idle check, not cache expiry, decides termination.
    pub fn touch(&self, key: &str, idle_timeout: Duration) {
        self.activity.set(key, Instant::now(), idle_timeout * 2);
    }

    pub fn last_activity(&self, key: &str) -> Option<Instant> {
        self.activity.get(key)
    }

    pub fn remove(&self, key: &str) -> Option<Session> {
        self.activity.delete(key);
        self.sessions.remove(key).map(|(_, session)| session)
    }

    /// Remove sessions whose activity has lapsed, pinned or not.
    pub fn purge_idle(&self) -> Vec<Session> {
        self.activity.purge_expired();
        let stale: Vec<String> = self
            .sessions
            .iter()
            .filter(|s| self.activity.get(s.key()).is_none())
            .map(|s| s.key().clone())
            .collect();

        stale.iter().filter_map(|key| self.remove(key)).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Audit trail of admin logins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminSessionRecord {
    pub id: Uuid,
    pub user_id: UserId,
    pub session_key: String,
    pub ip_address: Option<IpAddr>,
    pub user_agent: String,
    pub login_time: DateTime<Utc>,
    pub logout_time: Option<DateTime<Utc>>,
    pub is_active: bool,
}

/// Append-mostly store of [`AdminSessionRecord`]s.
///
/// At most one active record exists per (user, session key).
#[derive(Default)]
pub struct SessionLedger {
    records: RwLock<Vec<AdminSessionRecord>>,
}

impl SessionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(
        &self,
        user_id: UserId,
        session_key: &str,
        ip_address: Option<IpAddr>,
        user_agent: &str,
    ) -> Result<AdminSessionRecord, StoreError> {
        let mut records = self.records.write();
        if records
            .iter()
            .any(|r| r.is_active && r.user_id == user_id && r.session_key == session_key)
        {
            return Err(StoreError::Conflict(format!(
                "active session record already exists for user {user_id}"
            )));
        }

        let record = AdminSessionRecord {
            id: Uuid::new_v4(),
            user_id,
            session_key: session_key.to_string(),
            ip_address,
            user_agent: user_agent.to_string(),
            login_time: Utc::now(),
            logout_time: None,
            is_active: true,
        };
        records.push(record.clone());
        Ok(record)
    }

    /// Close the active record for (user, session key).
    pub fn close(&self, user_id: UserId, session_key: &str) -> Result<AdminSessionRecord, StoreError> {
        let mut records = self.records.write();
        let record = records
            .iter_mut()
            .find(|r| r.is_active && r.user_id == user_id && r.session_key == session_key)
            .ok_or_else(|| StoreError::NotFound(format!("active session record for user {user_id}")))?;

        record.is_active = false;
        record.logout_time = Some(Utc::now());
        Ok(record.clone())
    }

    /// Active records opened at or after `since`, newest first.
    pub fn active_since(&self, since: DateTime<Utc>) -> Vec<AdminSessionRecord> {
        let records = self.records.read();
        records
            .iter()
            .rev()
            .filter(|r| r.is_active && r.login_time >= since)
            .cloned()
            .collect()
    }

    pub fn find(&self, user_id: UserId, session_key: &str) -> Vec<AdminSessionRecord> {
        self.records
            .read()
            .iter()
            .filter(|r| r.user_id == user_id && r.session_key == session_key)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_single_active_record() {
        let ledger = SessionLedger::new();
        let ip: IpAddr = "10.0.0.1".parse().unwrap();

        ledger.open(1, "abc", Some(ip), "ua").unwrap();
        assert!(matches!(
            ledger.open(1, "abc", Some(ip), "ua"),
            Err(StoreError::Conflict(_))
        ));

        let closed = ledger.close(1, "abc").unwrap();
        assert!(!closed.is_active);
        assert!(closed.logout_time.is_some());
        assert!(matches!(ledger.close(1, "abc"), Err(StoreError::NotFound(_))));

        // A closed record does not block a new one.
        ledger.open(1, "abc", Some(ip), "ua").unwrap();
        assert_eq!(ledger.find(1, "abc").len(), 2);
        assert_eq!(ledger.active_since(Utc::now() - chrono::Duration::hours(24)).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_store_pin_touch_and_purge() {
        let store = SessionStore::new();
        let idle = Duration::from_secs(900);
        let ip: IpAddr = "10.0.0.1".parse().unwrap();

        let fresh = store.create(1, "ua");
        assert_eq!(fresh.pinned_ip, None);

        let other: IpAddr = "10.0.0.2".parse().unwrap();
        assert_eq!(store.pin(&fresh.key, ip).unwrap().pinned_ip, Some(ip));
        assert_eq!(store.pin(&fresh.key, other).unwrap().pinned_ip, Some(ip), "pin is sticky");
        store.touch(&fresh.key, idle);

        tokio::time::advance(idle * 2).await;
        let purged = store.purge_idle();
        assert_eq!(purged.len(), 1);
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_includes_unpinned_sessions() {
        let store = SessionStore::new();
        let idle = Duration::from_secs(900);

        let never_used = store.create(1, "ua");
        store.touch(&never_used.key, idle);
        let live = store.create(2, "ua");

        tokio::time::advance(idle).await;
        store.touch(&live.key, idle);
        tokio::time::advance(idle + Duration::from_secs(1)).await;

        let purged = store.purge_idle();
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].key, never_used.key);
        assert!(store.get(&live.key).is_some());
    }
}
