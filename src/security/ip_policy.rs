//! IP whitelist for the admin surface.

use std::net::IpAddr;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;
use ipnet::IpNet;

use crate::audit::{SecurityEventType, SecurityLogEntry};
use crate::http::response::GateError;
use crate::http::state::GateState;
use crate::observability::metrics;
use crate::security::client::ClientInfo;
use crate::security::path_classifier::classify;

/// Unknown addresses are never whitelisted.
pub fn is_whitelisted(ip: Option<IpAddr>, whitelist: &[IpNet]) -> bool {
    ip.is_some_and(|ip| whitelist.iter().any(|net| net.contains(&ip)))
}

/// Reject admin paths from addresses outside the whitelist as unknown pages.
pub async fn enforce_ip_policy(
    State(state): State<GateState>,
    client: ClientInfo,
    request: Request,
    next: Next,
) -> Result<Response, GateError> {
    let config = state.config();
    let path = request.uri().path();
    let class = classify(path, &config.admin);

    if !class.requires_whitelist() || is_whitelisted(client.ip, &config.admin.ip_whitelist) {
        return Ok(next.run(request).await);
    }

    tracing::warn!(ip = ?client.ip, path = %path, "Unauthorized admin access attempt");
    metrics::record_denial("ip_not_whitelisted");
    state.audit.append(
        SecurityLogEntry::new(SecurityEventType::UnauthorizedAccess, client.ip, &client.user_agent)
            .with_detail("reason", "ip_not_whitelisted")
            .with_detail("path", path),
    );
    Err(GateError::IpDenied)
}
