//! Configuration validation.
//!
//! Serde handles the syntactic side; this module checks that values make
//! sense together. Every problem is reported, not just the first.

use std::collections::HashSet;
use std::net::SocketAddr;

use thiserror::Error;
use totp_rs::Secret;

use crate::config::schema::GateConfig;

/// The security log viewer shows this many entries.
const MIN_RETAINED_ENTRIES: usize = 100;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Validate a parsed configuration.
pub fn validate_config(config: &GateConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new("listener.bind_address", "not a socket address"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than zero"));
    }

    validate_admin(config, &mut errors);

    if config.rate_limit.max_attempts == 0 {
        errors.push(ValidationError::new("rate_limit.max_attempts", "must be greater than zero"));
    }
    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::new("rate_limit.window_secs", "must be greater than zero"));
    }
    if config.rate_limit.purge_interval_secs == 0 {
        errors.push(ValidationError::new(
            "rate_limit.purge_interval_secs",
            "must be greater than zero",
        ));
    }

    if config.session.idle_timeout_secs == 0 {
        errors.push(ValidationError::new("session.idle_timeout_secs", "must be greater than zero"));
    }
    let cookie = &config.session.cookie_name;
    if cookie.is_empty() || !cookie.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
        errors.push(ValidationError::new(
            "session.cookie_name",
            "must be non-empty and contain only [A-Za-z0-9_-]",
        ));
    }

    if config.audit.retained_entries < MIN_RETAINED_ENTRIES {
        errors.push(ValidationError::new(
            "audit.retained_entries",
            format!("must be at least {MIN_RETAINED_ENTRIES}"),
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new("observability.metrics_address", "not a socket address"));
    }

    validate_accounts(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn validate_admin(config: &GateConfig, errors: &mut Vec<ValidationError>) {
    let admin = &config.admin;

    if !admin.portal_path.starts_with('/') || admin.portal_path.ends_with('/') {
        errors.push(ValidationError::new(
            "admin.portal_path",
            "must start with '/' and must not end with '/'",
        ));
    }
    if !admin
        .guarded_prefixes
        .iter()
        .any(|prefix| admin.portal_path.starts_with(prefix.as_str()))
    {
        errors.push(ValidationError::new(
            "admin.portal_path",
            "is not covered by any of admin.guarded_prefixes",
        ));
    }
    if !admin.emergency_target.starts_with(&admin.portal_path) {
        errors.push(ValidationError::new(
            "admin.emergency_target",
            "must live under admin.portal_path",
        ));
    }
    if admin.ip_whitelist.is_empty() {
        errors.push(ValidationError::new(
            "admin.ip_whitelist",
            "is empty; the admin surface would be unreachable",
        ));
    }
    for (i, prefix) in admin.guarded_prefixes.iter().chain(&admin.legacy_prefixes).enumerate() {
        if !prefix.starts_with('/') {
            errors.push(ValidationError::new(
                format!("admin.prefixes[{i}]"),
                format!("'{prefix}' must start with '/'"),
            ));
        }
    }
    for agent in &admin.suspicious_agents {
        if agent.is_empty() || agent.to_lowercase() != *agent {
            errors.push(ValidationError::new(
                "admin.suspicious_agents",
                format!("'{agent}' must be a non-empty lowercase fragment"),
            ));
        }
    }
}

fn validate_accounts(config: &GateConfig, errors: &mut Vec<ValidationError>) {
    let mut ids = HashSet::new();
    let mut usernames = HashSet::new();

    for (i, user) in config.users.iter().enumerate() {
        if !ids.insert(user.id) {
            errors.push(ValidationError::new(format!("users[{i}].id"), "duplicate id"));
        }
        if user.username.is_empty() || !usernames.insert(user.username.as_str()) {
            errors.push(ValidationError::new(
                format!("users[{i}].username"),
                "empty or duplicate username",
            ));
        }
        if argon2::PasswordHash::new(&user.password_hash).is_err() {
            errors.push(ValidationError::new(
                format!("users[{i}].password_hash"),
                "not a PHC hash string",
            ));
        }
        if let Some(secret) = &user.two_factor_secret {
            if Secret::Encoded(secret.clone()).to_bytes().is_err() {
                errors.push(ValidationError::new(
                    format!("users[{i}].two_factor_secret"),
                    "not valid base32",
                ));
            }
        }
    }

    let mut grants = HashSet::new();
    for (i, grant) in config.permissions.iter().enumerate() {
        if !ids.contains(&grant.user_id) {
            errors.push(ValidationError::new(
                format!("permissions[{i}].user_id"),
                format!("unknown user {}", grant.user_id),
            ));
        }
        if !ids.contains(&grant.granted_by) {
            errors.push(ValidationError::new(
                format!("permissions[{i}].granted_by"),
                format!("unknown user {}", grant.granted_by),
            ));
        }
        if !grants.insert((grant.user_id, grant.permission)) {
            errors.push(ValidationError::new(
                format!("permissions[{i}]"),
                "duplicate (user, permission) pair",
            ));
        }
    }
}
