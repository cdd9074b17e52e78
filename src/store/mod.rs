//! In-memory state shared by the gate stages.
//!
//! # Data Flow
//! ```text
//! rate limiter ──▶ cache.rs (ExpiringCache<u32>, keyed by client IP)
//! session guard ─▶ session.rs (SessionStore: sessions + activity cache)
//! login/logout ──▶ session.rs (SessionLedger: AdminSessionRecord rows)
//! authorization ─▶ permission.rs (PermissionStore)
//! two-factor ────▶ profile.rs (ProfileStore)
//! ```

pub mod cache;
pub mod permission;
pub mod profile;
pub mod session;

use thiserror::Error;

pub use cache::ExpiringCache;
pub use permission::{AdminPermission, PermissionStore, PermissionType};
pub use profile::{AdminProfile, ProfileStore};
pub use session::{AdminSessionRecord, Session, SessionLedger, SessionStore};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),
}
