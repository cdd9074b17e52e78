use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audit::{SecurityEventType, SecurityLogEntry};
use crate::auth::UserId;
use crate::http::response::GateError;
use crate::http::state::GateState;
use crate::security::{ClientInfo, CurrentSession};
use crate::store::{AdminPermission, PermissionType};

/// Entries shown by the security log viewer.
pub const SECURITY_LOG_LIMIT: usize = 100;

#[derive(Serialize)]
pub struct SecurityLogPage {
    pub logs: Vec<SecurityLogEntry>,
}

#[derive(Debug, Deserialize)]
pub struct GrantRequest {
    pub user_id: UserId,
    pub permission: PermissionType,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct RevokeRequest {
    pub user_id: UserId,
    pub permission: PermissionType,
}

pub async fn dashboard(State(state): State<GateState>, current: CurrentSession) -> Json<Value> {
    Json(state.dashboard.render(&state, &current.identity))
}

pub async fn security_logs(State(state): State<GateState>) -> Json<SecurityLogPage> {
    Json(SecurityLogPage {
        logs: state.audit.recent(SECURITY_LOG_LIMIT),
    })
}

pub async fn emergency_access(
    State(state): State<GateState>,
    client: ClientInfo,
    current: CurrentSession,
) -> Redirect {
    let config = state.config();

    tracing::warn!(user = %current.identity.username, ip = ?client.ip, "Emergency admin access");
    state.audit.append(
        SecurityLogEntry::new(SecurityEventType::EmergencyAdminAccess, client.ip, &client.user_agent)
            .with_user(current.identity.id)
            .with_detail("accessed_by", current.identity.username.as_str()),
    );

    Redirect::to(&config.admin.emergency_target)
}

pub async fn grant_permission(
    State(state): State<GateState>,
    current: CurrentSession,
    Json(request): Json<GrantRequest>,
) -> Result<Response, GateError> {
    if state.authenticator.find(request.user_id).is_none() {
        return Err(GateError::NotFound(format!("unknown user {}", request.user_id)));
    }
    if request.expires_at.is_some_and(|expires| expires <= Utc::now()) {
        return Err(GateError::BadRequest("expires_at must be in the future".to_string()));
    }

    let permission = state.permissions.grant(
        request.user_id,
        request.permission,
        current.identity.id,
        request.expires_at,
    )?;

    tracing::info!(
        granted_by = %current.identity.username,
        user_id = request.user_id,
        permission = ?request.permission,
        "Permission granted"
    );
    Ok((StatusCode::CREATED, Json(permission)).into_response())
}

pub async fn revoke_permission(
    State(state): State<GateState>,
    current: CurrentSession,
    Json(request): Json<RevokeRequest>,
) -> Result<Json<AdminPermission>, GateError> {
    let permission = state.permissions.revoke(request.user_id, request.permission)?;

    tracing::info!(
        revoked_by = %current.identity.username,
        user_id = request.user_id,
        permission = ?request.permission,
        "Permission revoked"
    );
    Ok(Json(permission))
}
