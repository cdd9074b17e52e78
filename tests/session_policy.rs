//! Idle timeout and address pinning of admin sessions.

use std::time::Duration;

use admin_gate::audit::SecurityEventType;
use axum::http::StatusCode;

mod common;
use common::*;

#[tokio::test(start_paused = true)]
async fn test_idle_session_is_terminated() {
    let config = test_config();
    let (app, state) = gate(config.clone());
    let cookie = login(&app, &config, "editor", LOCAL).await;
    let dashboard = config.admin.dashboard_path();

    let response = send(&app, get_as(&dashboard, LOCAL, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);

    // Activity inside the timeout keeps the session alive.
    tokio::time::advance(Duration::from_secs(10 * 60)).await;
    let response = send(&app, get_as(&dashboard, LOCAL, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::advance(Duration::from_secs(16 * 60)).await;
    let response = send(&app, get_as(&dashboard, LOCAL, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), config.admin.login_path());
    let cleared = response.headers()["set-cookie"].to_str().unwrap();
    assert!(cleared.starts_with(&format!("{}=;", config.session.cookie_name)));

    assert!(state.sessions.is_empty());
    let records = state.session_records.active_since(chrono::Utc::now() - chrono::Duration::hours(1));
    assert!(records.is_empty());

    let expired = state.audit.of_type(SecurityEventType::SessionExpired);
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].details["reason"], "idle_timeout");
    assert_eq!(expired[0].user_id, Some(EDITOR));
}

#[tokio::test]
async fn test_session_pinned_to_first_address() {
    let config = test_config();
    let (app, state) = gate(config.clone());
    let cookie = login(&app, &config, "editor", LOCAL).await;
    let dashboard = config.admin.dashboard_path();

    let response = send(&app, get_as(&dashboard, LOCAL, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = send(&app, get_as(&dashboard, OFFICE, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), config.admin.login_path());
    assert!(state.sessions.is_empty());

    let suspicious = state.audit.of_type(SecurityEventType::SuspiciousActivity);
    assert_eq!(suspicious.len(), 1);
    assert_eq!(suspicious[0].details["reason"], "session_ip_mismatch");
    assert_eq!(suspicious[0].details["session_ip"], LOCAL);
    assert_eq!(suspicious[0].details["current_ip"], OFFICE);

    // The stolen cookie is dead from the pinned address too.
    let response = send(&app, get_as(&dashboard, LOCAL, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).contains("?next="));
}

#[tokio::test]
async fn test_session_is_pinned_by_first_admin_request() {
    let config = test_config();
    let (app, state) = gate(config.clone());
    let cookie = login(&app, &config, "editor", LOCAL).await;
    let key = cookie.split_once('=').unwrap().1;
    assert_eq!(state.sessions.get(key).unwrap().pinned_ip, None);

    let response = send(&app, get_as(&config.admin.dashboard_path(), OFFICE, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let office: std::net::IpAddr = OFFICE.parse().unwrap();
    assert_eq!(state.sessions.get(key).unwrap().pinned_ip, Some(office));
}

#[tokio::test]
async fn test_public_pages_do_not_touch_sessions() {
    let config = test_config();
    let (app, state) = gate(config.clone());
    let cookie = login(&app, &config, "editor", LOCAL).await;

    // A public request from elsewhere neither pins nor terminates.
    let response = send(&app, get_as("/", OFFICE, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(state.sessions.len(), 1);

    let response = send(&app, get_as(&config.admin.dashboard_path(), OFFICE, Some(&cookie))).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_relogin_rotates_session() {
    let config = test_config();
    let (app, state) = gate(config.clone());
    let first = login(&app, &config, "editor", LOCAL).await;

    // A logged-in admin posting the form again is just redirected.
    let mut request = login_request(&config, "editor", PASSWORD, None, LOCAL);
    request.headers_mut().insert("cookie", first.parse().unwrap());
    let response = send(&app, request).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(session_cookie(&response, &config.session.cookie_name).is_none());
    assert_eq!(state.sessions.len(), 1);

    let second = login(&app, &config, "editor", LOCAL).await;
    assert_ne!(first, second);
    assert_eq!(state.sessions.len(), 2);
}
