//! The admin portal.
//!
//! All routes are mounted under the configured obscured prefix. Every route
//! except the login page sits behind an [`authorize`] layer carrying its
//! [`Requirement`].
//!
//! ```text
//! /auth/secure-gateway/                 login          (anyone)
//! /auth/secure-exit/                    logout         (staff)
//! /control-panel/dashboard/             dashboard      (staff)
//! /auth/two-factor/{setup,enable,disable}/             (staff)
//! /monitoring/security-audit/           security log   (SECURITY_LOGS or superuser)
//! /emergency/admin-access/              emergency hop  (superuser)
//! /control-panel/permissions/           grant          (superuser)
//! /control-panel/permissions/revoke/    revoke         (superuser)
//! ```

pub mod auth;
pub mod dashboard;
pub mod handlers;
pub mod two_factor;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;

use crate::http::state::GateState;
use crate::security::{authorize, Guard, Requirement};
use crate::store::PermissionType;

pub use dashboard::{DashboardStrategy, DefaultDashboard};

pub fn portal_router(state: &GateState) -> Router<GateState> {
    let portal = state.config().admin.portal_path.clone();
    let path = |suffix: &str| format!("{portal}{suffix}");
    let guarded = |requirement: Requirement, router: Router<GateState>| {
        router.route_layer(middleware::from_fn_with_state(
            Guard::new(state.clone(), requirement),
            authorize,
        ))
    };

    let open = Router::new().route(
        &path("/auth/secure-gateway/"),
        get(auth::login_page).post(auth::login),
    );

    let staff = Router::new()
        .route(&path("/auth/secure-exit/"), get(auth::logout).post(auth::logout))
        .route(&path("/control-panel/dashboard/"), get(handlers::dashboard))
        .route(&path("/auth/two-factor/setup/"), post(two_factor::setup))
        .route(&path("/auth/two-factor/enable/"), post(two_factor::enable))
        .route(&path("/auth/two-factor/disable/"), post(two_factor::disable));

    let security_logs = Router::new().route(
        &path("/monitoring/security-audit/"),
        get(handlers::security_logs),
    );

    let superuser = Router::new()
        .route(&path("/emergency/admin-access/"), get(handlers::emergency_access))
        .route(&path("/control-panel/permissions/"), post(handlers::grant_permission))
        .route(
            &path("/control-panel/permissions/revoke/"),
            post(handlers::revoke_permission),
        );

    open.merge(guarded(Requirement::Staff, staff))
        .merge(guarded(
            Requirement::Permission(PermissionType::SecurityLogs),
            security_logs,
        ))
        .merge(guarded(Requirement::Superuser, superuser))
}
