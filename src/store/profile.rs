//! Admin security profiles (two-factor state, last login address).

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;

use crate::auth::UserId;

#[derive(Debug, Clone, Serialize)]
pub struct AdminProfile {
    pub user_id: UserId,
    pub two_factor_enabled: bool,
    #[serde(skip)]
    pub two_factor_secret: Option<String>,
    /// Secret issued by setup and awaiting confirmation.
    #[serde(skip)]
    pub pending_secret: Option<String>,
    #[serde(skip)]
    pub backup_codes: Vec<String>,
    pub last_login_ip: Option<IpAddr>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AdminProfile {
    fn new(user_id: UserId) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            two_factor_enabled: false,
            two_factor_secret: None,
            pending_secret: None,
            backup_codes: Vec::new(),
            last_login_ip: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Consume a backup code. Codes are single use and case-insensitive.
    pub fn use_backup_code(&mut self, code: &str) -> bool {
        let code = code.trim().to_uppercase();
        match self.backup_codes.iter().position(|c| *c == code) {
            Some(index) => {
                self.backup_codes.remove(index);
                true
            }
            None => false,
        }
    }
}

#[derive(Default)]
pub struct ProfileStore {
    profiles: DashMap<UserId, AdminProfile>,
}

impl ProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a user's profile; users without one get a blank profile.
    pub fn get(&self, user_id: UserId) -> AdminProfile {
        self.profiles
            .get(&user_id)
            .map(|p| p.value().clone())
            .unwrap_or_else(|| AdminProfile::new(user_id))
    }

    /// Mutate a profile in place, creating it on first use.
    pub fn update<R>(&self, user_id: UserId, f: impl FnOnce(&mut AdminProfile) -> R) -> R {
        let mut profile = self
            .profiles
            .entry(user_id)
            .or_insert_with(|| AdminProfile::new(user_id));
        let result = f(&mut *profile);
        profile.updated_at = Utc::now();
        result
    }
}
