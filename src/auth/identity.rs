use serde::{Deserialize, Serialize};

pub type UserId = u64;

/// A user as reported by the authenticator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
}

impl Identity {
    /// Staff or superuser; the minimum bar for the admin surface.
    pub fn is_admin(&self) -> bool {
        self.is_active && (self.is_staff || self.is_superuser)
    }
}
