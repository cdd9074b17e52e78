//! Two-factor enrollment for the signed-in admin.
//!
//! Setup issues a pending secret; enable confirms it with a code and hands
//! out backup codes; disable requires a current code or a backup code.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::audit::{SecurityEventType, SecurityLogEntry};
use crate::auth::two_factor::generate_backup_codes;
use crate::auth::TwoFactor;
use crate::http::response::GateError;
use crate::http::state::GateState;
use crate::security::{ClientInfo, CurrentSession};

#[derive(Debug, Default, Deserialize)]
pub struct CodeRequest {
    pub code: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SetupResponse {
    pub secret: String,
    pub provisioning_uri: String,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub backup_codes: Vec<String>,
}

fn capability(state: &GateState) -> Result<Arc<dyn TwoFactor>, GateError> {
    state.two_factor.clone().ok_or(GateError::TwoFactorUnavailable)
}

fn required_code(request: &CodeRequest) -> Result<&str, GateError> {
    request
        .code
        .as_deref()
        .map(str::trim)
        .filter(|code| !code.is_empty())
        .ok_or(GateError::TwoFactorRequired)
}

pub async fn setup(
    State(state): State<GateState>,
    current: CurrentSession,
) -> Result<Json<SetupResponse>, GateError> {
    let two_factor = capability(&state)?;
    let identity = &current.identity;

    if state.profiles.get(identity.id).two_factor_enabled {
        return Err(GateError::Conflict(
            "Two-factor authentication is already enabled.".to_string(),
        ));
    }

    let secret = two_factor.generate_secret()?;
    let provisioning_uri = two_factor.provisioning_uri(&secret, &identity.username)?;
    state
        .profiles
        .update(identity.id, |p| p.pending_secret = Some(secret.clone()));

    tracing::info!(user = %identity.username, "Two-factor enrollment started");
    Ok(Json(SetupResponse {
        secret,
        provisioning_uri,
    }))
}

pub async fn enable(
    State(state): State<GateState>,
    client: ClientInfo,
    current: CurrentSession,
    Json(request): Json<CodeRequest>,
) -> Result<Json<StatusResponse>, GateError> {
    let two_factor = capability(&state)?;
    let code = required_code(&request)?;
    let identity = &current.identity;

    let Some(pending) = state.profiles.get(identity.id).pending_secret else {
        return Err(GateError::BadRequest("Run two-factor setup first.".to_string()));
    };
    if !two_factor.verify(&pending, code, &identity.username)? {
        return Err(GateError::BadRequest("Invalid verification code.".to_string()));
    }

    let backup_codes = generate_backup_codes();
    state.profiles.update(identity.id, |p| {
        p.two_factor_enabled = true;
        p.two_factor_secret = p.pending_secret.take();
        p.backup_codes = backup_codes.clone();
    });

    tracing::info!(user = %identity.username, "Two-factor authentication enabled");
    state.audit.append(
        SecurityLogEntry::new(SecurityEventType::TwoFactorEnabled, client.ip, &client.user_agent)
            .with_user(identity.id),
    );
    Ok(Json(StatusResponse {
        enabled: true,
        backup_codes,
    }))
}

pub async fn disable(
    State(state): State<GateState>,
    client: ClientInfo,
    current: CurrentSession,
    Json(request): Json<CodeRequest>,
) -> Result<Json<StatusResponse>, GateError> {
    let two_factor = capability(&state)?;
    let code = required_code(&request)?;
    let identity = &current.identity;

    let profile = state.profiles.get(identity.id);
    let Some(secret) = profile.two_factor_secret.as_deref().filter(|_| profile.two_factor_enabled) else {
        return Err(GateError::BadRequest(
            "Two-factor authentication is not enabled.".to_string(),
        ));
    };

    let confirmed = two_factor.verify(secret, code, &identity.username)?
        || state.profiles.update(identity.id, |p| p.use_backup_code(code));
    if !confirmed {
        return Err(GateError::BadRequest("Invalid verification code.".to_string()));
    }

    state.profiles.update(identity.id, |p| {
        p.two_factor_enabled = false;
        p.two_factor_secret = None;
        p.pending_secret = None;
        p.backup_codes.clear();
    });

    tracing::info!(user = %identity.username, "Two-factor authentication disabled");
    state.audit.append(
        SecurityLogEntry::new(SecurityEventType::TwoFactorDisabled, client.ip, &client.user_agent)
            .with_user(identity.id),
    );
    Ok(Json(StatusResponse {
        enabled: false,
        backup_codes: Vec::new(),
    }))
}
