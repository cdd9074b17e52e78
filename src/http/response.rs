//! Gate rejections and how they render.
//!
//! Anything that would reveal the admin surface to an outsider renders as
//! the same plain 404 the site serves for unknown pages. Session
//! terminations redirect to the login page and clear the session cookie.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::store::StoreError;

pub const NOT_FOUND_BODY: &str = "Page not found";
pub const LOCKED_MESSAGE: &str = "Too many failed attempts. Please try again later.";
pub const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid credentials.";

#[derive(Debug, Error)]
pub enum GateError {
    #[error("path is not served")]
    PathDenied,

    #[error("client address is not whitelisted")]
    IpDenied,

    #[error("client address is locked out")]
    RateLimited,

    #[error("login locked after repeated failures")]
    LoginLocked,

    #[error("session idle for too long")]
    SessionExpired { location: String, cookie: String },

    #[error("session used from a different address")]
    SessionHijackSuspected { location: String, cookie: String },

    #[error("permission denied")]
    PermissionDenied,

    #[error("login required")]
    LoginRequired { location: String },

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("username and password are required")]
    MissingCredentials,

    #[error("a verification code is required")]
    TwoFactorRequired,

    #[error("two-factor authentication is not available")]
    TwoFactorUnavailable,

    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl GateError {
    /// Denials that must look like an unknown page.
    pub fn is_hidden(&self) -> bool {
        matches!(
            self,
            GateError::PathDenied
                | GateError::IpDenied
                | GateError::RateLimited
                | GateError::PermissionDenied
        )
    }
}

impl From<StoreError> for GateError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(msg) => GateError::NotFound(msg),
            StoreError::Conflict(msg) => GateError::Conflict(msg),
        }
    }
}

impl From<AuthError> for GateError {
    fn from(err: AuthError) -> Self {
        GateError::Internal(err.to_string())
    }
}

/// A cookie that tells the browser to drop the session cookie.
pub fn removal_cookie(name: &str) -> Cookie<'static> {
    let mut cookie = Cookie::build((name.to_string(), "")).path("/").build();
    cookie.make_removal();
    cookie
}

fn error_json(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        if self.is_hidden() {
            return (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response();
        }

        match self {
            GateError::SessionExpired { location, cookie }
            | GateError::SessionHijackSuspected { location, cookie } => {
                let jar = CookieJar::new().add(removal_cookie(&cookie));
                (jar, Redirect::to(&location)).into_response()
            }
            GateError::LoginRequired { location } => Redirect::to(&location).into_response(),
            GateError::LoginLocked => (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({ "error": LOCKED_MESSAGE, "locked": true })),
            )
                .into_response(),
            GateError::InvalidCredentials => error_json(StatusCode::UNAUTHORIZED, INVALID_CREDENTIALS_MESSAGE),
            GateError::MissingCredentials => error_json(
                StatusCode::BAD_REQUEST,
                "Please provide both username and password.",
            ),
            GateError::TwoFactorRequired => {
                error_json(StatusCode::BAD_REQUEST, "A verification code is required.")
            }
            GateError::TwoFactorUnavailable => error_json(
                StatusCode::SERVICE_UNAVAILABLE,
                "Two-factor authentication is not available.",
            ),
            GateError::BadRequest(msg) => error_json(StatusCode::BAD_REQUEST, &msg),
            GateError::NotFound(msg) => error_json(StatusCode::NOT_FOUND, &msg),
            GateError::Conflict(msg) => error_json(StatusCode::CONFLICT, &msg),
            GateError::Internal(msg) => {
                tracing::error!(error = %msg, "Internal error");
                error_json(StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
            GateError::PathDenied
            | GateError::IpDenied
            | GateError::RateLimited
            | GateError::PermissionDenied => (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::header::{LOCATION, SET_COOKIE};

    #[test]
    fn test_hidden_denials_are_plain_404() {
        for err in [
            GateError::PathDenied,
            GateError::IpDenied,
            GateError::RateLimited,
            GateError::PermissionDenied,
        ] {
            assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
        }
    }

    #[test]
    fn test_session_termination_redirects_and_clears_cookie() {
        let response = GateError::SessionHijackSuspected {
            location: "/secure-admin-portal/auth/secure-gateway/".to_string(),
            cookie: "gate_session".to_string(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers()[LOCATION],
            "/secure-admin-portal/auth/secure-gateway/"
        );
        let cookie = response.headers()[SET_COOKIE].to_str().unwrap();
        assert!(cookie.starts_with("gate_session=;"));
        assert!(cookie.contains("Max-Age=0"));
    }

    #[test]
    fn test_store_errors_map_to_status() {
        let conflict: GateError = StoreError::Conflict("dup".to_string()).into();
        assert_eq!(conflict.into_response().status(), StatusCode::CONFLICT);
        assert_eq!(GateError::LoginLocked.into_response().status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
