//! Shared utilities for the gate integration tests.

#![allow(dead_code)]

use std::net::{IpAddr, SocketAddr};

use admin_gate::config::{GateConfig, UserConfig};
use admin_gate::http::{GateServer, GateState};
use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHasher, Version};
use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::header::{CONTENT_TYPE, COOKIE, LOCATION, SET_COOKIE};
use axum::http::{Method, Request, Response};
use axum::routing::get;
use axum::Router;
use totp_rs::{Secret, TOTP};
use tower::ServiceExt;

pub const PASSWORD: &str = "correct horse battery staple";
pub const TOTP_SECRET: &str = "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP";

pub const ROOT: u64 = 1;
pub const EDITOR: u64 = 2;
pub const READER: u64 = 3;
pub const GUARDED: u64 = 4;

pub const LOCAL: &str = "127.0.0.1";
pub const OFFICE: &str = "10.0.0.5";
pub const OUTSIDER: &str = "203.0.113.9";

/// Argon2id with minimal cost so logins stay fast under test.
pub fn cheap_hash(password: &str) -> String {
    let params = Params::new(8, 1, 1, None).unwrap();
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &SaltString::generate(&mut OsRng))
        .unwrap()
        .to_string()
}

fn user(id: u64, username: &str, is_staff: bool, is_superuser: bool) -> UserConfig {
    UserConfig {
        id,
        username: username.to_string(),
        email: format!("{username}@example.com"),
        password_hash: cheap_hash(PASSWORD),
        is_active: true,
        is_staff,
        is_superuser,
        two_factor_secret: None,
    }
}

/// Defaults plus the office network on the whitelist and four accounts:
/// a superuser, a staff editor, a non-staff reader and a staff account
/// with 2FA enabled.
pub fn test_config() -> GateConfig {
    let mut config = GateConfig::default();
    config.admin.ip_whitelist.push("10.0.0.0/8".parse().unwrap());

    let mut guarded = user(GUARDED, "guarded", true, false);
    guarded.two_factor_secret = Some(TOTP_SECRET.to_string());

    config.users = vec![
        user(ROOT, "root", true, true),
        user(EDITOR, "editor", true, false),
        user(READER, "reader", false, false),
        guarded,
    ];
    config
}

/// Stand-in for the protected application.
pub fn upstream(config: &GateConfig) -> Router {
    Router::new()
        .route("/", get(|| async { "home" }))
        .route("/admin/", get(|| async { "framework admin" }))
        .route(&config.admin.emergency_target, get(|| async { "emergency admin" }))
}

pub fn gate(config: GateConfig) -> (Router, GateState) {
    let upstream = upstream(&config);
    let server = GateServer::builder(config).upstream(upstream).build().unwrap();
    (server.router(), server.state().clone())
}

pub fn current_code() -> String {
    let secret = Secret::Encoded(TOTP_SECRET.to_string()).to_bytes().unwrap();
    TOTP::new(totp_rs::Algorithm::SHA1, 6, 1, 30, secret, None, "guarded".to_string())
        .unwrap()
        .generate_current()
        .unwrap()
}

pub fn request(method: Method, path: &str, ip: &str) -> axum::http::request::Builder {
    let ip: IpAddr = ip.parse().unwrap();
    Request::builder()
        .method(method)
        .uri(path)
        .extension(ConnectInfo(SocketAddr::new(ip, 40_000)))
}

pub fn get_as(path: &str, ip: &str, cookie: Option<&str>) -> Request<Body> {
    let mut builder = request(Method::GET, path, ip);
    if let Some(cookie) = cookie {
        builder = builder.header(COOKIE, cookie);
    }
    builder.body(Body::empty()).unwrap()
}

pub fn post_json(path: &str, ip: &str, cookie: &str, body: serde_json::Value) -> Request<Body> {
    request(Method::POST, path, ip)
        .header(COOKIE, cookie)
        .header(CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn login_request(config: &GateConfig, username: &str, password: &str, otp: Option<&str>, ip: &str) -> Request<Body> {
    let mut form = format!("username={username}&password={}", password.replace(' ', "+"));
    if let Some(otp) = otp {
        form.push_str(&format!("&otp={otp}"));
    }
    request(Method::POST, &config.admin.login_path(), ip)
        .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(form))
        .unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

/// Log in and return the `name=value` session cookie.
pub async fn login(app: &Router, config: &GateConfig, username: &str, ip: &str) -> String {
    let response = send(app, login_request(config, username, PASSWORD, None, ip)).await;
    assert_eq!(response.status(), 303, "login for {username} failed");
    session_cookie(&response, &config.session.cookie_name).expect("session cookie")
}

pub fn session_cookie(response: &Response<Body>, name: &str) -> Option<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .find(|pair| pair.starts_with(&format!("{name}=")) && pair.len() > name.len() + 1)
        .map(str::to_string)
}

pub fn location(response: &Response<Body>) -> &str {
    response.headers()[LOCATION].to_str().unwrap()
}

pub async fn body_string(response: Response<Body>) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}
