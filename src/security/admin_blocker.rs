//! Blocks the framework admin surface and the emergency admin surface.
//!
//! Anonymous visitors are sent to the portal login with `next` set.
//! Authenticated users below the required level see an unknown page.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::audit::{SecurityEventType, SecurityLogEntry};
use crate::config::AdminConfig;
use crate::http::response::GateError;
use crate::http::state::GateState;
use crate::observability::metrics;
use crate::security::client::ClientInfo;
use crate::security::path_classifier::{classify, PathClass};
use crate::security::session_guard::CurrentSession;

/// Login URL that returns to `next` afterwards.
pub fn login_redirect(admin: &AdminConfig, next: &str) -> String {
    let next: String = url::form_urlencoded::byte_serialize(next.as_bytes()).collect();
    format!("{}?next={}", admin.login_path(), next)
}

pub async fn block_admin_surfaces(
    State(state): State<GateState>,
    client: ClientInfo,
    request: Request,
    next: Next,
) -> Result<Response, GateError> {
    let config = state.config();
    let path = request.uri().path().to_string();

    let needs_superuser = match classify(&path, &config.admin) {
        PathClass::LegacyAdmin => false,
        PathClass::EmergencyAdmin => true,
        _ => return Ok(next.run(request).await),
    };

    let Some(current) = request.extensions().get::<CurrentSession>() else {
        return Err(GateError::LoginRequired {
            location: login_redirect(&config.admin, &path),
        });
    };

    let identity = &current.identity;
    let allowed = if needs_superuser {
        identity.is_active && identity.is_superuser
    } else {
        identity.is_admin()
    };

    if allowed {
        tracing::info!(user = %identity.username, path = %path, "Admin access granted");
        return Ok(next.run(request).await);
    }

    let reason = if needs_superuser { "not_superuser" } else { "not_staff" };
    tracing::warn!(
        ip = ?client.ip,
        user = %identity.username,
        path = %path,
        "Blocked non-admin authenticated access"
    );
    metrics::record_denial(reason);
    state.audit.append(
        SecurityLogEntry::new(SecurityEventType::UnauthorizedAccess, client.ip, &client.user_agent)
            .with_user(identity.id)
            .with_detail("reason", reason)
            .with_detail("path", path.as_str()),
    );
    Err(GateError::PermissionDenied)
}
