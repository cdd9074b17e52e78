//! Per-route authorization for portal pages.
//!
//! Each portal route declares a [`Requirement`]; the [`authorize`] layer
//! checks it against the current session before the handler runs.

use axum::extract::{FromRef, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use chrono::{DateTime, Utc};

use crate::audit::{SecurityEventType, SecurityLogEntry};
use crate::auth::Identity;
use crate::http::response::GateError;
use crate::http::state::GateState;
use crate::observability::metrics;
use crate::security::admin_blocker::login_redirect;
use crate::security::client::ClientInfo;
use crate::security::session_guard::CurrentSession;
use crate::store::{PermissionStore, PermissionType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Staff,
    Superuser,
    /// The named permission, or superuser.
    Permission(PermissionType),
}

impl Requirement {
    pub fn is_satisfied(self, identity: &Identity, permissions: &PermissionStore, now: DateTime<Utc>) -> bool {
        if !identity.is_admin() {
            return false;
        }
        match self {
            Requirement::Staff => true,
            Requirement::Superuser => identity.is_superuser,
            Requirement::Permission(permission) => {
                identity.is_superuser || permissions.has_permission(identity.id, permission, now)
            }
        }
    }

    fn denial_reason(self) -> &'static str {
        match self {
            Requirement::Staff => "not_staff",
            Requirement::Superuser => "not_superuser",
            Requirement::Permission(_) => "missing_permission",
        }
    }
}

/// State of the [`authorize`] layer.
#[derive(Clone)]
pub struct Guard {
    pub state: GateState,
    pub requirement: Requirement,
}

impl Guard {
    pub fn new(state: GateState, requirement: Requirement) -> Self {
        Self { state, requirement }
    }
}

impl FromRef<Guard> for GateState {
    fn from_ref(guard: &Guard) -> Self {
        guard.state.clone()
    }
}

pub async fn authorize(
    State(guard): State<Guard>,
    client: ClientInfo,
    request: Request,
    next: Next,
) -> Result<Response, GateError> {
    let state = &guard.state;
    let path = request.uri().path();

    let Some(current) = request.extensions().get::<CurrentSession>() else {
        let config = state.config();
        return Err(GateError::LoginRequired {
            location: login_redirect(&config.admin, path),
        });
    };

    if guard
        .requirement
        .is_satisfied(&current.identity, &state.permissions, Utc::now())
    {
        return Ok(next.run(request).await);
    }

    let reason = guard.requirement.denial_reason();
    tracing::warn!(
        user = %current.identity.username,
        requirement = ?guard.requirement,
        path = %path,
        "Portal access denied"
    );
    metrics::record_denial(reason);
    let mut entry = SecurityLogEntry::new(SecurityEventType::UnauthorizedAccess, client.ip, &client.user_agent)
        .with_user(current.identity.id)
        .with_detail("reason", reason)
        .with_detail("path", path);
    if let Requirement::Permission(permission) = guard.requirement {
        entry = entry.with_detail("permission", serde_json::to_value(permission).unwrap_or_default());
    }
    state.audit.append(entry);

    Err(GateError::PermissionDenied)
}
