//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GateConfig (validated, immutable)
//!     → shared via ArcSwap to every gate stage
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads new config
//!     → validation.rs validates
//!     → server swaps the live GateConfig
//! ```
//!
//! The router shape (portal path, route table) is fixed at startup. Policy
//! values such as the whitelist, rate limits and idle timeout take effect
//! on the next request after a reload.

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    AdminConfig, AuditConfig, GateConfig, ListenerConfig, ObservabilityConfig,
    PermissionGrantConfig, RateLimitConfig, SessionConfig, TimeoutConfig, TlsConfig,
    TwoFactorConfig, UserConfig,
};
pub use watcher::ConfigWatcher;
