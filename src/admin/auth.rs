//! Portal login and logout.

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::{Form, Json};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use serde_json::json;

use crate::audit::{SecurityEventType, SecurityLogEntry};
use crate::auth::{AuthError, Identity};
use crate::config::GateConfig;
use crate::http::response::{removal_cookie, GateError};
use crate::http::state::GateState;
use crate::observability::metrics;
use crate::security::session_guard::{end_session, session_cookie};
use crate::security::{ClientInfo, CurrentSession};

#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    pub username: Option<String>,
    pub password: Option<String>,
    /// TOTP or backup code; required when the account has 2FA enabled.
    pub otp: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

/// Why a login was refused. Only ever logged; the client always sees the
/// same generic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoginFailure {
    InvalidCredentials,
    Inactive,
    NotStaff,
    TwoFactorMissing,
    TwoFactorInvalid,
    TwoFactorUnavailable,
}

impl LoginFailure {
    fn as_str(self) -> &'static str {
        match self {
            LoginFailure::InvalidCredentials => "invalid_credentials",
            LoginFailure::Inactive => "inactive",
            LoginFailure::NotStaff => "not_staff",
            LoginFailure::TwoFactorMissing => "two_factor_missing",
            LoginFailure::TwoFactorInvalid => "two_factor_invalid",
            LoginFailure::TwoFactorUnavailable => "two_factor_unavailable",
        }
    }
}

/// Only local absolute paths are followed after login.
fn safe_next(next: Option<&str>) -> Option<&str> {
    next.filter(|next| {
        next.starts_with('/')
            && !next.starts_with("//")
            && !next.contains('\\')
            && !next.chars().any(char::is_control)
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn already_logged_in(current: Option<&CurrentSession>) -> bool {
    current.is_some_and(|current| current.identity.is_admin())
}

fn reject_locked(state: &GateState, client: &ClientInfo) -> GateError {
    tracing::warn!(ip = ?client.ip, "Login attempt from locked-out client");
    metrics::record_login("locked");
    state.audit.append(SecurityLogEntry::new(
        SecurityEventType::LoginLocked,
        client.ip,
        &client.user_agent,
    ));
    GateError::LoginLocked
}

pub async fn login_page(
    State(state): State<GateState>,
    client: ClientInfo,
    current: Option<CurrentSession>,
    Query(query): Query<LoginQuery>,
) -> Result<Response, GateError> {
    let config = state.config();
    if already_logged_in(current.as_ref()) {
        return Ok(Redirect::to(&config.admin.dashboard_path()).into_response());
    }
    if state.rate_limiter.is_locked(client.ip, &config.rate_limit) {
        return Err(reject_locked(&state, &client));
    }

    Ok(Json(json!({
        "fields": ["username", "password", "otp"],
        "next": safe_next(query.next.as_deref()),
    }))
    .into_response())
}

pub async fn login(
    State(state): State<GateState>,
    client: ClientInfo,
    current: Option<CurrentSession>,
    jar: CookieJar,
    Query(query): Query<LoginQuery>,
    Form(form): Form<LoginForm>,
) -> Result<Response, GateError> {
    let config = state.config();
    if already_logged_in(current.as_ref()) {
        return Ok(Redirect::to(&config.admin.dashboard_path()).into_response());
    }
    if state.rate_limiter.is_locked(client.ip, &config.rate_limit) {
        return Err(reject_locked(&state, &client));
    }

    let (Some(username), Some(password)) = (
        non_empty(form.username.as_deref()),
        form.password.as_deref().filter(|p| !p.is_empty()),
    ) else {
        return Err(GateError::MissingCredentials);
    };

    let identity = match verify_login(&state, username, password, form.otp.as_deref()) {
        Ok(identity) => identity,
        Err(failure) => {
            let counter = state.rate_limiter.record_failure(client.ip, &config.rate_limit);
            tracing::info!(
                ip = ?client.ip,
                username = %username,
                reason = failure.as_str(),
                attempts = counter.count,
                "Admin login failed"
            );
            metrics::record_login("failed");
            state.audit.append(
                SecurityLogEntry::new(SecurityEventType::LoginFailed, client.ip, &client.user_agent)
                    .with_detail("username", username)
                    .with_detail("reason", failure.as_str())
                    .with_detail("attempts", counter.count),
            );
            return Err(GateError::InvalidCredentials);
        }
    };

    // A pre-existing session (e.g. a non-staff one) is replaced, never reused.
    if let Some(previous) = &current {
        end_session(&state, &previous.session);
    }

    let (jar, target) = start_session(&state, &config, &client, &identity, jar, query.next.as_deref());
    Ok((jar, Redirect::to(&target)).into_response())
}

fn verify_login(
    state: &GateState,
    username: &str,
    password: &str,
    otp: Option<&str>,
) -> Result<Identity, LoginFailure> {
    let identity = match state.authenticator.authenticate(username, password) {
        Ok(identity) => identity,
        Err(AuthError::InvalidCredentials) => return Err(LoginFailure::InvalidCredentials),
        Err(e) => {
            tracing::warn!(username = %username, error = %e, "Credential check failed");
            return Err(LoginFailure::InvalidCredentials);
        }
    };

    if !identity.is_active {
        return Err(LoginFailure::Inactive);
    }
    if !identity.is_admin() {
        return Err(LoginFailure::NotStaff);
    }

    let profile = state.profiles.get(identity.id);
    if !profile.two_factor_enabled {
        return Ok(identity);
    }

    let Some(two_factor) = &state.two_factor else {
        tracing::warn!(username = %username, "2FA enabled for account but capability is unavailable");
        return Err(LoginFailure::TwoFactorUnavailable);
    };
    let Some(code) = non_empty(otp) else {
        return Err(LoginFailure::TwoFactorMissing);
    };
    let Some(secret) = profile.two_factor_secret.as_deref() else {
        tracing::warn!(username = %username, "2FA enabled for account without a secret");
        return Err(LoginFailure::TwoFactorUnavailable);
    };

    match two_factor.verify(secret, code, &identity.username) {
        Ok(true) => Ok(identity),
        Ok(false) => {
            if state.profiles.update(identity.id, |p| p.use_backup_code(code)) {
                tracing::info!(username = %username, "Backup code used for login");
                Ok(identity)
            } else {
                Err(LoginFailure::TwoFactorInvalid)
            }
        }
        Err(e) => {
            tracing::warn!(username = %username, error = %e, "TOTP verification failed");
            Err(LoginFailure::TwoFactorInvalid)
        }
    }
}

/// Create the session, its ledger record and cookie. Returns the redirect
/// target.
fn start_session(
    state: &GateState,
    config: &GateConfig,
    client: &ClientInfo,
    identity: &Identity,
    jar: CookieJar,
    next: Option<&str>,
) -> (CookieJar, String) {
    state.rate_limiter.reset(client.ip);

    let session = state.sessions.create(identity.id, &client.user_agent);
    state.sessions.touch(
        &session.key,
        std::time::Duration::from_secs(config.session.idle_timeout_secs),
    );

    if let Err(e) = state
        .session_records
        .open(identity.id, &session.key, client.ip, &client.user_agent)
    {
        tracing::warn!(user = %identity.username, error = %e, "Failed to record admin session");
    }
    state.profiles.update(identity.id, |p| p.last_login_ip = client.ip);

    tracing::info!(user = %identity.username, ip = ?client.ip, "Admin login succeeded");
    metrics::record_login("success");
    state.audit.append(
        SecurityLogEntry::new(SecurityEventType::LoginSuccess, client.ip, &client.user_agent)
            .with_user(identity.id),
    );

    let secure = config.session.secure_cookie || config.listener.tls.is_some();
    let jar = jar.add(session_cookie(&config.session.cookie_name, &session.key, secure));
    let target = safe_next(next)
        .map(str::to_string)
        .unwrap_or_else(|| config.admin.dashboard_path());
    (jar, target)
}

pub async fn logout(
    State(state): State<GateState>,
    client: ClientInfo,
    current: CurrentSession,
    jar: CookieJar,
) -> Response {
    let config = state.config();
    end_session(&state, &current.session);

    tracing::info!(user = %current.identity.username, "Admin logged out");
    state.audit.append(
        SecurityLogEntry::new(SecurityEventType::Logout, client.ip, &client.user_agent)
            .with_user(current.identity.id),
    );

    let jar = jar.add(removal_cookie(&config.session.cookie_name));
    (jar, Redirect::to(&config.admin.login_path())).into_response()
}
