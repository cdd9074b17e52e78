//! HTTP server setup.
//!
//! # Responsibilities
//! - Build shared state (stores, audit log, authenticator, 2FA capability)
//! - Assemble the router: portal routes plus the protected upstream
//! - Wire the gate stages in their fixed order
//! - Serve plain TCP or TLS with graceful shutdown
//! - Run background tasks (expiry sweep, config reload)

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use axum::http::StatusCode;
use axum::middleware;
use axum::response::IntoResponse;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio::time::MissedTickBehavior;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::admin::{self, DashboardStrategy, DefaultDashboard};
use crate::audit::AuditLog;
use crate::auth::{two_factor, Authenticator, DirectoryAuthenticator, TwoFactor};
use crate::config::{GateConfig, TlsConfig};
use crate::http::request::{propagate_request_id, set_request_id};
use crate::http::response::NOT_FOUND_BODY;
use crate::http::state::GateState;
use crate::lifecycle::StartupError;
use crate::observability::RequestSpan;
use crate::security::admin_blocker::block_admin_surfaces;
use crate::security::headers::harden_response_headers;
use crate::security::ip_policy::enforce_ip_policy;
use crate::security::portal_guard::guard_portal;
use crate::security::session_guard::{guard_session, load_session};
use crate::security::RateLimiter;
use crate::store::{PermissionStore, ProfileStore, SessionLedger, SessionStore};

/// Portal forms and JSON bodies are small.
const MAX_BODY_BYTES: usize = 64 * 1024;

/// Time given to in-flight TLS connections on shutdown.
const TLS_DRAIN: Duration = Duration::from_secs(10);

pub struct GateServerBuilder {
    config: GateConfig,
    authenticator: Option<Arc<dyn Authenticator>>,
    two_factor: Option<Option<Arc<dyn TwoFactor>>>,
    dashboard: Option<Arc<dyn DashboardStrategy>>,
    upstream: Option<Router>,
}

impl GateServerBuilder {
    /// Replace the config-backed account directory.
    pub fn authenticator(mut self, authenticator: Arc<dyn Authenticator>) -> Self {
        self.authenticator = Some(authenticator);
        self
    }

    /// Override the 2FA capability. `None` runs the gate without one.
    pub fn two_factor(mut self, two_factor: Option<Arc<dyn TwoFactor>>) -> Self {
        self.two_factor = Some(two_factor);
        self
    }

    pub fn dashboard(mut self, dashboard: Arc<dyn DashboardStrategy>) -> Self {
        self.dashboard = Some(dashboard);
        self
    }

    /// The application protected by the gate. Defaults to a 404 for
    /// everything the portal does not serve.
    pub fn upstream(mut self, upstream: Router) -> Self {
        self.upstream = Some(upstream);
        self
    }

    pub fn build(self) -> Result<GateServer, StartupError> {
        let config = self.config;

        let audit = AuditLog::open(&config.audit)?;
        let authenticator: Arc<dyn Authenticator> = match self.authenticator {
            Some(authenticator) => authenticator,
            None => Arc::new(DirectoryAuthenticator::new(&config.users)),
        };
        let dashboard: Arc<dyn DashboardStrategy> = match self.dashboard {
            Some(dashboard) => dashboard,
            None => Arc::new(DefaultDashboard),
        };
        let two_factor = self
            .two_factor
            .unwrap_or_else(|| two_factor::resolve(&config.two_factor));

        let permissions = PermissionStore::new();
        for grant in &config.permissions {
            permissions.grant(grant.user_id, grant.permission, grant.granted_by, grant.expires_at)?;
        }

        let profiles = ProfileStore::new();
        for user in &config.users {
            if let Some(secret) = &user.two_factor_secret {
                profiles.update(user.id, |p| {
                    p.two_factor_enabled = true;
                    p.two_factor_secret = Some(secret.clone());
                });
            }
        }

        let state = GateState {
            config: Arc::new(ArcSwap::from_pointee(config)),
            rate_limiter: Arc::new(RateLimiter::new()),
            sessions: Arc::new(SessionStore::new()),
            session_records: Arc::new(SessionLedger::new()),
            permissions: Arc::new(permissions),
            profiles: Arc::new(profiles),
            audit: Arc::new(audit),
            authenticator,
            two_factor,
            dashboard,
        };

        let upstream = self.upstream.unwrap_or_else(default_upstream);
        let router = GateServer::build_router(state.clone(), upstream);
        Ok(GateServer { state, router })
    }
}

/// The admin gate: portal, gate stages and the protected upstream.
pub struct GateServer {
    state: GateState,
    router: Router,
}

impl GateServer {
    /// Create a server with the bundled authenticator and dashboard.
    pub fn new(config: GateConfig) -> Result<Self, StartupError> {
        Self::builder(config).build()
    }

    pub fn builder(config: GateConfig) -> GateServerBuilder {
        GateServerBuilder {
            config,
            authenticator: None,
            two_factor: None,
            dashboard: None,
            upstream: None,
        }
    }

    /// Stages run top to bottom on the way in:
    /// headers, request ID, trace, timeout, body limit, IP policy,
    /// portal guard, session load, session guard, admin blocker.
    #[allow(deprecated)]
    fn build_router(state: GateState, upstream: Router) -> Router {
        let request_timeout = Duration::from_secs(state.config().timeouts.request_secs);

        admin::portal_router(&state)
            .with_state(state.clone())
            .merge(upstream)
            .layer(middleware::from_fn_with_state(state.clone(), block_admin_surfaces))
            .layer(middleware::from_fn_with_state(state.clone(), guard_session))
            .layer(middleware::from_fn_with_state(state.clone(), load_session))
            .layer(middleware::from_fn_with_state(state.clone(), guard_portal))
            .layer(middleware::from_fn_with_state(state, enforce_ip_policy))
            .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
            .layer(TimeoutLayer::new(request_timeout))
            .layer(TraceLayer::new_for_http().make_span_with(RequestSpan))
            .layer(propagate_request_id())
            .layer(set_request_id())
            .layer(middleware::from_fn(harden_response_headers))
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        config_updates: mpsc::UnboundedReceiver<GateConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "Admin gate listening");

        self.spawn_background(config_updates, &shutdown);

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("Admin gate stopped");
        Ok(())
    }

    /// Serve HTTPS on `addr`.
    pub async fn run_tls(
        self,
        addr: SocketAddr,
        tls: &TlsConfig,
        config_updates: mpsc::UnboundedReceiver<GateConfig>,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path).await?;
        tracing::info!(address = %addr, "Admin gate listening (TLS)");

        self.spawn_background(config_updates, &shutdown);

        let handle = axum_server::Handle::new();
        let drain = handle.clone();
        tokio::spawn(async move {
            let _ = shutdown.recv().await;
            drain.graceful_shutdown(Some(TLS_DRAIN));
        });

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum_server::bind_rustls(addr, rustls).handle(handle).serve(app).await?;

        tracing::info!("Admin gate stopped");
        Ok(())
    }

    fn spawn_background(
        &self,
        config_updates: mpsc::UnboundedReceiver<GateConfig>,
        shutdown: &broadcast::Receiver<()>,
    ) {
        tokio::spawn(sweep(self.state.clone(), shutdown.resubscribe()));
        tokio::spawn(apply_config_updates(
            self.state.clone(),
            config_updates,
            shutdown.resubscribe(),
        ));
    }
}

fn default_upstream() -> Router {
    Router::new().fallback(|| async { (StatusCode::NOT_FOUND, NOT_FOUND_BODY).into_response() })
}

/// Drop expired rate-limit counters and idle sessions. Returns
/// (counters, sessions) removed.
pub fn purge(state: &GateState) -> (usize, usize) {
    let counters = state.rate_limiter.purge_expired();
    let sessions = state.sessions.purge_idle();
    for session in &sessions {
        if let Err(e) = state.session_records.close(session.user_id, &session.key) {
            tracing::debug!(user_id = session.user_id, error = %e, "No session record to close");
        }
    }
    if counters > 0 || !sessions.is_empty() {
        tracing::debug!(counters, sessions = sessions.len(), "Purged expired gate state");
    }
    (counters, sessions.len())
}

async fn sweep(state: GateState, mut shutdown: broadcast::Receiver<()>) {
    let period = Duration::from_secs(state.config().rate_limit.purge_interval_secs.max(1));
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                purge(&state);
            }
            _ = shutdown.recv() => break,
        }
    }
}

async fn apply_config_updates(
    state: GateState,
    mut updates: mpsc::UnboundedReceiver<GateConfig>,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Some(new_config) => reload(&state, new_config),
                None => break,
            },
            _ = shutdown.recv() => break,
        }
    }
}

/// Swap in a new configuration. Route layout and accounts are fixed at
/// startup; everything else applies from the next request.
pub fn reload(state: &GateState, new_config: GateConfig) {
    let current = state.config();
    if new_config.admin.portal_path != current.admin.portal_path {
        tracing::warn!(
            current = %current.admin.portal_path,
            requested = %new_config.admin.portal_path,
            "portal_path changes require a restart"
        );
    }
    state.config.store(Arc::new(new_config));
    tracing::info!("Configuration reloaded");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reload_swaps_policy() {
        let server = GateServer::new(GateConfig::default()).unwrap();
        let mut updated = GateConfig::default();
        updated.rate_limit.max_attempts = 2;

        reload(server.state(), updated);
        assert_eq!(server.state().config().rate_limit.max_attempts, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_purge_closes_idle_session_records() {
        let server = GateServer::new(GateConfig::default()).unwrap();
        let state = server.state();
        let ip = "127.0.0.1".parse().ok();

        let pinned = state.sessions.create(7, "test");
        state.sessions.pin(&pinned.key, "127.0.0.1".parse().unwrap());
        state.sessions.touch(&pinned.key, Duration::from_secs(900));
        state.session_records.open(7, &pinned.key, ip, "test").unwrap();

        // Logged in but never used for an admin request.
        let unpinned = state.sessions.create(8, "test");
        state.sessions.touch(&unpinned.key, Duration::from_secs(900));
        state.session_records.open(8, &unpinned.key, ip, "test").unwrap();

        tokio::time::advance(Duration::from_secs(1801)).await;
        assert_eq!(purge(state), (0, 2));
        assert!(state.session_records.find(7, &pinned.key).iter().all(|r| !r.is_active));
        assert!(state.session_records.find(8, &unpinned.key).iter().all(|r| !r.is_active));
        assert!(state.sessions.is_empty());
    }

    #[tokio::test]
    async fn test_seeds_permissions_and_profiles() {
        let config: GateConfig = toml::from_str(
            r#"
            [[users]]
            id = 3
            username = "ops"
            password_hash = "x"
            is_staff = true
            two_factor_secret = "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP"

            [[permissions]]
            user_id = 3
            permission = "SECURITY_LOGS"
            granted_by = 1
            "#,
        )
        .unwrap();

        let server = GateServer::new(config).unwrap();
        let state = server.state();
        assert!(state.profiles.get(3).two_factor_enabled);
        assert!(state
            .permissions
            .has_permission(3, crate::store::PermissionType::SecurityLogs, chrono::Utc::now()));
    }
}
