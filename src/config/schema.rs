//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the gate.
//! All types derive Serde traits for deserialization from config files.

use std::net::{IpAddr, Ipv6Addr};

use chrono::{DateTime, Utc};
use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::store::permission::PermissionType;

/// Root configuration for the admin gate.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GateConfig {
    /// Listener configuration (bind address, TLS).
    pub listener: ListenerConfig,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Admin surface layout and IP policy.
    pub admin: AdminConfig,

    /// Failed-login rate limiting.
    pub rate_limit: RateLimitConfig,

    /// Admin session policy.
    pub session: SessionConfig,

    /// TOTP capability.
    pub two_factor: TwoFactorConfig,

    /// Security log persistence.
    pub audit: AuditConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Accounts served by the bundled directory authenticator.
    pub users: Vec<UserConfig>,

    /// Permissions granted at startup.
    pub permissions: Vec<PermissionGrantConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            tls: None,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Layout of the administrative surface.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Obscured prefix the portal routes are mounted under.
    pub portal_path: String,

    /// Prefixes that identify the portal for the IP policy and session guard.
    pub guarded_prefixes: Vec<String>,

    /// Prefixes of the framework admin surface handled by the blocker.
    pub legacy_prefixes: Vec<String>,

    /// Legacy login-related paths that stay reachable without a session.
    pub legacy_open_paths: Vec<String>,

    /// Superuser-only emergency admin surface served upstream.
    pub emergency_target: String,

    /// Networks allowed to reach admin-prefixed paths. Bare addresses are
    /// single-host networks.
    #[serde(deserialize_with = "deserialize_networks")]
    pub ip_whitelist: Vec<IpNet>,

    /// Use the first `X-Forwarded-For` entry as the client address.
    pub trust_forwarded_for: bool,

    /// Lowercase user-agent fragments rejected on admin paths.
    pub suspicious_agents: Vec<String>,
}

fn deserialize_networks<'de, D>(deserializer: D) -> Result<Vec<IpNet>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Vec<String> = Vec::deserialize(deserializer)?;
    raw.iter()
        .map(|entry| {
            entry
                .parse::<IpNet>()
                .or_else(|_| entry.parse::<IpAddr>().map(IpNet::from))
                .map_err(|_| serde::de::Error::custom(format!("invalid address or network '{entry}'")))
        })
        .collect()
}

impl AdminConfig {
    /// Absolute path of the portal login page.
    pub fn login_path(&self) -> String {
        format!("{}/auth/secure-gateway/", self.portal_path)
    }

    /// Absolute path of the portal logout endpoint.
    pub fn logout_path(&self) -> String {
        format!("{}/auth/secure-exit/", self.portal_path)
    }

    /// Absolute path of the portal dashboard.
    pub fn dashboard_path(&self) -> String {
        format!("{}/control-panel/dashboard/", self.portal_path)
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            portal_path: "/secure-admin-portal".to_string(),
            guarded_prefixes: vec!["/secure-admin-".to_string(), "/admin-panel-".to_string()],
            legacy_prefixes: vec!["/admin".to_string(), "/hidden-backend-admin".to_string()],
            legacy_open_paths: vec![
                "/admin/login/".to_string(),
                "/admin/logout/".to_string(),
                "/admin/password_change/".to_string(),
                "/admin/jsi18n/".to_string(),
            ],
            emergency_target: "/secure-admin-portal/emergency-admin/".to_string(),
            ip_whitelist: vec![
                IpNet::from(IpAddr::from([127, 0, 0, 1])),
                IpNet::from(IpAddr::from(Ipv6Addr::LOCALHOST)),
            ],
            trust_forwarded_for: false,
            suspicious_agents: vec![
                "bot".to_string(),
                "crawler".to_string(),
                "spider".to_string(),
                "scraper".to_string(),
            ],
        }
    }
}

/// Failed-login rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Failures tolerated per window before the IP is locked out.
    pub max_attempts: u32,

    /// Window length in seconds, counted from the first failure.
    pub window_secs: u64,

    /// Interval of the expired-entry sweep in seconds.
    pub purge_interval_secs: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            window_secs: 3600,
            purge_interval_secs: 60,
        }
    }
}

/// Admin session configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Idle time after which a session is terminated.
    pub idle_timeout_secs: u64,

    /// Name of the session cookie.
    pub cookie_name: String,

    /// Mark the cookie `Secure` (set automatically when TLS is configured).
    pub secure_cookie: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: 900,
            cookie_name: "gate_session".to_string(),
            secure_cookie: false,
        }
    }
}

/// Two-factor authentication configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TwoFactorConfig {
    /// Provide the TOTP capability to the login flow.
    pub enabled: bool,

    /// Issuer shown in authenticator apps.
    pub issuer: String,
}

impl Default for TwoFactorConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            issuer: "Admin Gate".to_string(),
        }
    }
}

/// Security log configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AuditConfig {
    /// Append every entry to this JSON-lines file and replay its tail at
    /// startup.
    pub persistence_path: Option<String>,

    /// Entries kept in memory for the log viewer and dashboard. Older
    /// entries survive only in the persistence file.
    pub retained_entries: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            persistence_path: None,
            retained_entries: 10_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON log lines instead of the pretty format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// An account known to the directory authenticator.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UserConfig {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub email: String,

    /// Argon2 PHC string.
    pub password_hash: String,

    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default)]
    pub is_staff: bool,
    #[serde(default)]
    pub is_superuser: bool,

    /// Base32 TOTP secret; enables 2FA for the account when present.
    #[serde(default)]
    pub two_factor_secret: Option<String>,
}

fn default_true() -> bool {
    true
}

/// A permission seeded at startup.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PermissionGrantConfig {
    pub user_id: u64,
    pub permission: PermissionType,
    pub granted_by: u64,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}
