//! Admin gate.
//!
//! Hardens the administrative surface of a web application: an obscured
//! admin portal, an IP whitelist, failed-login lockout, idle and
//! IP-pinned admin sessions, blocking of the framework's stock admin, and
//! a security event log.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ headers → request id → trace → timeout → body limit
//!                         │
//!                         ▼
//!                  ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//!                  │  ip policy  │──▶│ portal guard │──▶│ session load │
//!                  └─────────────┘   └──────────────┘   └──────┬───────┘
//!                                                              ▼
//!                  ┌─────────────┐   ┌──────────────┐   ┌──────────────┐
//!                  │  upstream   │◀──│admin blocker │◀──│session guard │
//!                  │ or portal   │   └──────────────┘   └──────────────┘
//!                  └─────────────┘
//!
//!     Cross-cutting: config (hot reload), store (sessions, permissions,
//!     profiles), audit (security log), observability, lifecycle
//! ```

pub mod admin;
pub mod audit;
pub mod auth;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod security;
pub mod store;

pub use config::schema::GateConfig;
pub use http::{GateError, GateServer, GateState};
pub use lifecycle::Shutdown;
