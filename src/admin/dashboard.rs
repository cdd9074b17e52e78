//! Dashboard content.
//!
//! What the dashboard shows is pluggable: embedders hand a
//! [`DashboardStrategy`] to the server builder. [`DefaultDashboard`] shows
//! recent security events, active admin sessions and the caller's
//! permissions.

use chrono::{Duration, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::audit::SecurityLogEntry;
use crate::auth::Identity;
use crate::http::state::GateState;
use crate::store::{AdminPermission, AdminSessionRecord};

pub trait DashboardStrategy: Send + Sync {
    fn render(&self, state: &GateState, identity: &Identity) -> Value;
}

#[derive(Debug, Serialize)]
pub struct DashboardView {
    pub user: Identity,
    pub recent_logs: Vec<SecurityLogEntry>,
    pub active_sessions: Vec<AdminSessionRecord>,
    pub user_permissions: Vec<AdminPermission>,
}

#[derive(Debug, Clone, Default)]
pub struct DefaultDashboard;

impl DefaultDashboard {
    const RECENT_LOG_DAYS: i64 = 7;
    const RECENT_LOG_LIMIT: usize = 10;
    const ACTIVE_SESSION_HOURS: i64 = 24;

    pub fn view(&self, state: &GateState, identity: &Identity) -> DashboardView {
        let now = Utc::now();
        DashboardView {
            user: identity.clone(),
            recent_logs: state
                .audit
                .since(now - Duration::days(Self::RECENT_LOG_DAYS), Self::RECENT_LOG_LIMIT),
            active_sessions: state
                .session_records
                .active_since(now - Duration::hours(Self::ACTIVE_SESSION_HOURS)),
            user_permissions: state.permissions.effective_for(identity.id, now),
        }
    }
}

impl DashboardStrategy for DefaultDashboard {
    fn render(&self, state: &GateState, identity: &Identity) -> Value {
        match serde_json::to_value(self.view(state, identity)) {
            Ok(value) => value,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to render dashboard");
                serde_json::json!({ "user": identity })
            }
        }
    }
}
