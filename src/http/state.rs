//! Shared state injected into every gate stage and portal handler.

use std::sync::Arc;

use arc_swap::ArcSwap;

use crate::admin::dashboard::DashboardStrategy;
use crate::audit::AuditLog;
use crate::auth::{Authenticator, TwoFactor};
use crate::config::GateConfig;
use crate::security::RateLimiter;
use crate::store::{PermissionStore, ProfileStore, SessionLedger, SessionStore};

#[derive(Clone)]
pub struct GateState {
    /// Live configuration; swapped on reload.
    pub config: Arc<ArcSwap<GateConfig>>,
    pub rate_limiter: Arc<RateLimiter>,
    pub sessions: Arc<SessionStore>,
    pub session_records: Arc<SessionLedger>,
    pub permissions: Arc<PermissionStore>,
    pub profiles: Arc<ProfileStore>,
    pub audit: Arc<AuditLog>,
    pub authenticator: Arc<dyn Authenticator>,
    /// Absent when 2FA is disabled in the configuration.
    pub two_factor: Option<Arc<dyn TwoFactor>>,
    pub dashboard: Arc<dyn DashboardStrategy>,
}

impl GateState {
    /// Snapshot of the current configuration.
    pub fn config(&self) -> Arc<GateConfig> {
        self.config.load_full()
    }
}
