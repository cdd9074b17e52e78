//! Per-feature admin permissions.

use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};

use crate::auth::UserId;
use crate::store::StoreError;

/// Features inside the admin surface that can be granted individually.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PermissionType {
    UserManagement,
    ContentManagement,
    SystemSettings,
    SecurityLogs,
    Analytics,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminPermission {
    pub user_id: UserId,
    pub permission_type: PermissionType,
    pub granted_by: UserId,
    pub granted_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl AdminPermission {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires| now > expires)
    }

    /// Active and not expired.
    pub fn is_effective(&self, now: DateTime<Utc>) -> bool {
        self.is_active && !self.is_expired(now)
    }
}

/// Permission grants, unique per (user, permission type).
#[derive(Default)]
pub struct PermissionStore {
    grants: DashMap<(UserId, PermissionType), AdminPermission>,
}

impl PermissionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Grant a permission.
    ///
    /// A revoked or expired grant for the same pair is replaced in place; an
    /// effective one is a conflict.
    pub fn grant(
        &self,
        user_id: UserId,
        permission_type: PermissionType,
        granted_by: UserId,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<AdminPermission, StoreError> {
        let now = Utc::now();
        let permission = AdminPermission {
            user_id,
            permission_type,
            granted_by,
            granted_at: now,
            expires_at,
            is_active: true,
        };

        match self.grants.entry((user_id, permission_type)) {
            Entry::Occupied(mut existing) => {
                if existing.get().is_effective(now) {
                    return Err(StoreError::Conflict(format!(
                        "user {user_id} already holds {permission_type:?}"
                    )));
                }
                existing.insert(permission.clone());
            }
            Entry::Vacant(slot) => {
                slot.insert(permission.clone());
            }
        }
        Ok(permission)
    }

    pub fn revoke(&self, user_id: UserId, permission_type: PermissionType) -> Result<AdminPermission, StoreError> {
        let mut grant = self
            .grants
            .get_mut(&(user_id, permission_type))
            .filter(|g| g.is_active)
            .ok_or_else(|| StoreError::NotFound(format!("{permission_type:?} for user {user_id}")))?;
        grant.is_active = false;
        Ok(grant.clone())
    }

    pub fn has_permission(&self, user_id: UserId, permission_type: PermissionType, now: DateTime<Utc>) -> bool {
        self.grants
            .get(&(user_id, permission_type))
            .is_some_and(|g| g.is_effective(now))
    }

    /// Effective grants of a user.
    pub fn effective_for(&self, user_id: UserId, now: DateTime<Utc>) -> Vec<AdminPermission> {
        let mut grants: Vec<_> = self
            .grants
            .iter()
            .filter(|g| g.user_id == user_id && g.is_effective(now))
            .map(|g| g.value().clone())
            .collect();
        grants.sort_by_key(|g| g.granted_at);
        grants
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_grant_is_unique_per_pair() {
        let store = PermissionStore::new();
        store.grant(2, PermissionType::SecurityLogs, 1, None).unwrap();
        assert!(matches!(
            store.grant(2, PermissionType::SecurityLogs, 1, None),
            Err(StoreError::Conflict(_))
        ));
        store.grant(2, PermissionType::Analytics, 1, None).unwrap();
        assert_eq!(store.effective_for(2, Utc::now()).len(), 2);
    }

    #[test]
    fn test_revoke_and_regrant() {
        let store = PermissionStore::new();
        store.grant(2, PermissionType::SecurityLogs, 1, None).unwrap();
        store.revoke(2, PermissionType::SecurityLogs).unwrap();
        assert!(!store.has_permission(2, PermissionType::SecurityLogs, Utc::now()));
        assert!(matches!(
            store.revoke(2, PermissionType::SecurityLogs),
            Err(StoreError::NotFound(_))
        ));

        store.grant(2, PermissionType::SecurityLogs, 1, None).unwrap();
        assert!(store.has_permission(2, PermissionType::SecurityLogs, Utc::now()));
    }

    #[test]
    fn test_expired_grant_is_not_effective() {
        let store = PermissionStore::new();
        let now = Utc::now();
        store
            .grant(2, PermissionType::SecurityLogs, 1, Some(now + Duration::hours(1)))
            .unwrap();

        assert!(store.has_permission(2, PermissionType::SecurityLogs, now));
        assert!(!store.has_permission(2, PermissionType::SecurityLogs, now + Duration::hours(2)));
        assert!(store.effective_for(2, now + Duration::hours(2)).is_empty());
    }

    #[test]
    fn test_expired_grant_can_be_granted_again() {
        let store = PermissionStore::new();
        let now = Utc::now();
        store
            .grant(2, PermissionType::SecurityLogs, 1, Some(now - Duration::seconds(1)))
            .unwrap();
        assert!(!store.has_permission(2, PermissionType::SecurityLogs, Utc::now()));

        let renewed = store
            .grant(2, PermissionType::SecurityLogs, 3, Some(now + Duration::days(1)))
            .unwrap();
        assert_eq!(renewed.granted_by, 3);
        assert!(store.has_permission(2, PermissionType::SecurityLogs, Utc::now()));
        assert!(matches!(
            store.grant(2, PermissionType::SecurityLogs, 1, None),
            Err(StoreError::Conflict(_))
        ));
    }

    #[test]
    fn test_permission_type_wire_names() {
        let json = serde_json::to_string(&PermissionType::SecurityLogs).unwrap();
        assert_eq!(json, "\"SECURITY_LOGS\"");
    }
}
