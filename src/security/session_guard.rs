//! Admin session loading and the idle/IP-pinning guard.
//!
//! # State machine
//! ```text
//! Fresh ──(first admin request: pin IP)──▶ Active
//! Active ──(idle > timeout)──────────────▶ Expired
//! Active ──(request from other IP)───────▶ IP-Mismatch-Terminated
//! ```
//!
//! Sessions start unpinned at login. A session whose activity entry is gone
//! from the cache counts as expired. Terminal states remove the session, close its ledger record and
//! redirect to the login page with the cookie cleared.

use std::net::IpAddr;
use std::time::Duration;

use axum::extract::{FromRequestParts, OptionalFromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::Response;
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tokio::time::Instant;

use crate::audit::{SecurityEventType, SecurityLogEntry};
use crate::auth::Identity;
use crate::config::GateConfig;
use crate::http::response::GateError;
use crate::http::state::GateState;
use crate::observability::metrics;
use crate::security::client::ClientInfo;
use crate::security::path_classifier::classify;
use crate::store::Session;

/// The authenticated session of the current request.
#[derive(Debug, Clone)]
pub struct CurrentSession {
    pub session: Session,
    pub identity: Identity,
}

/// Handlers behind [`crate::security::authorize`] always have a session.
impl<S: Send + Sync> FromRequestParts<S> for CurrentSession {
    type Rejection = GateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentSession>()
            .cloned()
            .ok_or(GateError::PermissionDenied)
    }
}

impl<S: Send + Sync> OptionalFromRequestParts<S> for CurrentSession {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Option<Self>, Self::Rejection> {
        Ok(parts.extensions.get::<CurrentSession>().cloned())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCheck {
    /// Not yet pinned to an address.
    Fresh,
    Active,
    Expired,
    IpMismatch { pinned: IpAddr },
}

pub fn check_session(
    session: &Session,
    last_activity: Option<Instant>,
    ip: Option<IpAddr>,
    idle_timeout: Duration,
    now: Instant,
) -> SessionCheck {
    let idle_exceeded = |last: Instant| now.saturating_duration_since(last) > idle_timeout;

    match (last_activity, session.pinned_ip) {
        (None, _) => SessionCheck::Expired,
        (Some(last), _) if idle_exceeded(last) => SessionCheck::Expired,
        (Some(_), None) => SessionCheck::Fresh,
        (Some(_), Some(pinned)) if ip != Some(pinned) => SessionCheck::IpMismatch { pinned },
        (Some(_), Some(_)) => SessionCheck::Active,
    }
}

/// Cookie carrying the session key.
pub fn session_cookie(name: &str, key: &str, secure: bool) -> Cookie<'static> {
    Cookie::build((name.to_string(), key.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Strict)
        .secure(secure)
        .build()
}

/// Remove a session and close its ledger record.
pub fn end_session(state: &GateState, session: &Session) {
    state.sessions.remove(&session.key);
    if let Err(e) = state.session_records.close(session.user_id, &session.key) {
        tracing::debug!(user_id = session.user_id, error = %e, "No session record to close");
    }
}

/// Attach the session named by the cookie, if it is live and its user
/// still exists and is active.
pub async fn load_session(
    State(state): State<GateState>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Response {
    let config = state.config();

    let session = jar
        .get(&config.session.cookie_name)
        .and_then(|cookie| state.sessions.get(cookie.value()));

    if let Some(session) = session {
        match state
            .authenticator
            .find(session.user_id)
            .filter(|identity| identity.is_active)
        {
            Some(identity) => {
                request
                    .extensions_mut()
                    .insert(CurrentSession { session, identity });
            }
            None => {
                tracing::info!(user_id = session.user_id, "Dropping session of unknown or inactive user");
                end_session(&state, &session);
            }
        }
    }

    next.run(request).await
}

#[derive(Debug, Clone, Copy)]
enum Termination {
    Idle,
    IpMismatch { pinned: IpAddr },
}

/// Enforce the idle timeout and IP pinning on admin requests.
pub async fn guard_session(
    State(state): State<GateState>,
    client: ClientInfo,
    request: Request,
    next: Next,
) -> Result<Response, GateError> {
    let config = state.config();
    let class = classify(request.uri().path(), &config.admin);

    let current = match request.extensions().get::<CurrentSession>() {
        Some(current) if class.is_admin() => current.clone(),
        _ => return Ok(next.run(request).await),
    };

    let key = current.session.key.as_str();
    let idle_timeout = Duration::from_secs(config.session.idle_timeout_secs);
    let check = check_session(
        &current.session,
        state.sessions.last_activity(key),
        client.ip,
        idle_timeout,
        Instant::now(),
    );

    match check {
        SessionCheck::Fresh => {
            if let Some(ip) = client.ip {
                state.sessions.pin(key, ip);
            }
            state.sessions.touch(key, idle_timeout);
        }
        SessionCheck::Active => state.sessions.touch(key, idle_timeout),
        SessionCheck::Expired => {
            return Err(terminate(&state, &config, &current, &client, Termination::Idle));
        }
        SessionCheck::IpMismatch { pinned } => {
            return Err(terminate(
                &state,
                &config,
                &current,
                &client,
                Termination::IpMismatch { pinned },
            ));
        }
    }

    Ok(next.run(request).await)
}

fn terminate(
    state: &GateState,
    config: &GateConfig,
    current: &CurrentSession,
    client: &ClientInfo,
    termination: Termination,
) -> GateError {
    end_session(state, &current.session);

    let location = config.admin.login_path();
    let cookie = config.session.cookie_name.clone();
    let entry = |event| {
        SecurityLogEntry::new(event, client.ip, &client.user_agent).with_user(current.identity.id)
    };

    match termination {
        Termination::Idle => {
            tracing::info!(user = %current.identity.username, "Admin session expired");
            metrics::record_session_terminated("idle");
            state.audit.append(
                entry(SecurityEventType::SessionExpired)
                    .with_detail("reason", "idle_timeout")
                    .with_detail("idle_timeout_secs", config.session.idle_timeout_secs),
            );
            GateError::SessionExpired { location, cookie }
        }
        Termination::IpMismatch { pinned } => {
            tracing::warn!(
                user = %current.identity.username,
                session_ip = %pinned,
                current_ip = ?client.ip,
                "Session IP mismatch"
            );
            metrics::record_session_terminated("ip_mismatch");
            state.audit.append(
                entry(SecurityEventType::SuspiciousActivity)
                    .with_detail("reason", "session_ip_mismatch")
                    .with_detail("session_ip", pinned.to_string())
                    .with_detail(
                        "current_ip",
                        client.ip.map(|ip| ip.to_string()).unwrap_or_default(),
                    ),
            );
            GateError::SessionHijackSuspected { location, cookie }
        }
    }
}
