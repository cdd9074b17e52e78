//! Startup orchestration.
//!
//! Any startup error is fatal. The listener binds last, so traffic only
//! arrives once every stage is ready.

use std::net::SocketAddr;
use std::path::Path;

use metrics_exporter_prometheus::BuildError;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing_subscriber::util::TryInitError;

use crate::audit::AuditError;
use crate::config::{load_config, ConfigError, ConfigWatcher, GateConfig};
use crate::http::GateServer;
use crate::lifecycle::Shutdown;
use crate::observability::{init_logging, metrics};
use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("security log error: {0}")]
    Audit(#[from] AuditError),

    #[error("failed to seed permissions: {0}")]
    Seed(#[from] StoreError),

    #[error("failed to initialize logging: {0}")]
    Logging(#[from] TryInitError),

    #[error("failed to initialize metrics: {0}")]
    Metrics(#[from] BuildError),

    #[error("failed to watch configuration: {0}")]
    Watch(#[from] notify::Error),

    #[error("invalid address '{0}'")]
    Address(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn parse_address(raw: &str) -> Result<SocketAddr, StartupError> {
    raw.parse().map_err(|_| StartupError::Address(raw.to_string()))
}

/// Load configuration, start the gate and serve until a shutdown signal.
///
/// Without a config file the built-in defaults are used and hot reload is
/// off.
pub async fn run(config_path: Option<&Path>) -> Result<(), StartupError> {
    let config = match config_path {
        Some(path) => load_config(path)?,
        None => GateConfig::default(),
    };

    init_logging(&config.observability)?;
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "admin-gate starting");

    if config.observability.metrics_enabled {
        metrics::init_metrics(parse_address(&config.observability.metrics_address)?)?;
    }

    let bind = parse_address(&config.listener.bind_address)?;
    let tls = config.listener.tls.clone();
    tracing::info!(
        bind_address = %bind,
        tls = tls.is_some(),
        portal = %config.admin.portal_path,
        whitelist = config.admin.ip_whitelist.len(),
        users = config.users.len(),
        "Configuration loaded"
    );

    // The watcher must stay alive for the lifetime of the server.
    let (config_updates, _watcher) = match config_path {
        Some(path) => {
            let (watcher, updates) = ConfigWatcher::new(path);
            (updates, Some(watcher.run()?))
        }
        None => {
            let (_, updates) = mpsc::unbounded_channel();
            (updates, None)
        }
    };

    let server = GateServer::new(config)?;

    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    shutdown.trigger_on_signal();

    match tls {
        Some(tls) => server.run_tls(bind, &tls, config_updates, signal).await?,
        None => {
            let listener = TcpListener::bind(bind).await?;
            server.run(listener, config_updates, signal).await?;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
