//! Request path classification.
//!
//! Every gate stage decides what to do from the class of the path alone, so
//! the prefix rules live in one place.

use crate::config::AdminConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PathClass {
    /// Ordinary site pages.
    Public,
    /// Login-related admin paths reachable from anywhere.
    Open,
    /// The obscured admin portal.
    Portal,
    /// The superuser-only emergency admin surface.
    EmergencyAdmin,
    /// The framework admin surface.
    LegacyAdmin,
}

impl PathClass {
    pub fn is_admin(self) -> bool {
        self != PathClass::Public
    }

    /// Whether the client address must be inside the IP whitelist.
    pub fn requires_whitelist(self) -> bool {
        matches!(
            self,
            PathClass::Portal | PathClass::EmergencyAdmin | PathClass::LegacyAdmin
        )
    }
}

pub fn classify(path: &str, admin: &AdminConfig) -> PathClass {
    if path == admin.login_path()
        || path == admin.logout_path()
        || admin
            .legacy_open_paths
            .iter()
            .any(|open| path.starts_with(open.as_str()))
    {
        return PathClass::Open;
    }

    if path.starts_with(admin.emergency_target.as_str())
        || path == admin.emergency_target.trim_end_matches('/')
    {
        return PathClass::EmergencyAdmin;
    }

    if admin
        .guarded_prefixes
        .iter()
        .any(|prefix| path.starts_with(prefix.as_str()))
    {
        return PathClass::Portal;
    }

    if admin
        .legacy_prefixes
        .iter()
        .any(|prefix| matches_segment(path, prefix))
    {
        return PathClass::LegacyAdmin;
    }

    PathClass::Public
}

/// `/admin` matches `/admin` and `/admin/...` but not `/administrator`.
fn matches_segment(path: &str, prefix: &str) -> bool {
    let prefix = prefix.trim_end_matches('/');
    match path.strip_prefix(prefix) {
        Some(rest) => rest.is_empty() || rest.starts_with('/'),
        None => false,
    }
}
