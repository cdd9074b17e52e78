//! Extra screening for admin paths: locked-out clients and crawlers.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::audit::{SecurityEventType, SecurityLogEntry};
use crate::http::response::GateError;
use crate::http::state::GateState;
use crate::observability::metrics;
use crate::security::client::ClientInfo;
use crate::security::path_classifier::classify;

/// `suspicious` holds lowercase fragments.
pub fn is_suspicious_agent(user_agent: &str, suspicious: &[String]) -> bool {
    let user_agent = user_agent.to_lowercase();
    suspicious
        .iter()
        .any(|fragment| user_agent.contains(fragment.as_str()))
}

/// Hide the admin surface from crawlers and from locked-out clients.
///
/// The login page itself stays reachable for locked-out clients so it can
/// answer with an explicit lockout response.
pub async fn guard_portal(
    State(state): State<GateState>,
    client: ClientInfo,
    request: Request,
    next: Next,
) -> Result<Response, GateError> {
    let config = state.config();
    let path = request.uri().path();
    let class = classify(path, &config.admin);

    if !class.is_admin() {
        return Ok(next.run(request).await);
    }

    if is_suspicious_agent(&client.user_agent, &config.admin.suspicious_agents) {
        tracing::warn!(
            ip = ?client.ip,
            user_agent = %client.user_agent,
            path = %path,
            "Suspicious user agent accessing admin"
        );
        metrics::record_denial("suspicious_user_agent");
        state.audit.append(
            SecurityLogEntry::new(SecurityEventType::SuspiciousActivity, client.ip, &client.user_agent)
                .with_detail("reason", "suspicious_user_agent")
                .with_detail("path", path),
        );
        return Err(GateError::PathDenied);
    }

    if class.requires_whitelist() && state.rate_limiter.is_locked(client.ip, &config.rate_limit) {
        tracing::warn!(ip = ?client.ip, path = %path, "Admin rate limit exceeded");
        metrics::record_denial("rate_limited");
        state.audit.append(
            SecurityLogEntry::new(SecurityEventType::UnauthorizedAccess, client.ip, &client.user_agent)
                .with_detail("reason", "rate_limited")
                .with_detail("path", path),
        );
        return Err(GateError::RateLimited);
    }

    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suspicious_agents() {
        let fragments: Vec<String> = ["bot", "crawler", "spider", "scraper"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        assert!(is_suspicious_agent("Googlebot/2.1", &fragments));
        assert!(is_suspicious_agent("Some-SPIDER", &fragments));
        assert!(!is_suspicious_agent("Mozilla/5.0 (X11; Linux x86_64)", &fragments));
        assert!(!is_suspicious_agent("", &fragments));
    }
}
