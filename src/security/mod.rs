//! Security subsystem: the gate stages.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → headers.rs (response hardening, outermost)
//!     → ip_policy.rs (whitelist admin paths)
//!     → portal_guard.rs (crawlers, locked-out clients)
//!     → session_guard.rs (load session, idle timeout, IP pinning)
//!     → admin_blocker.rs (legacy and emergency admin surfaces)
//!     → authorize.rs (per-route requirement on portal pages)
//!     → handler
//! ```
//!
//! Every stage classifies the path with path_classifier.rs and either
//! passes the request on untouched or short-circuits with a `GateError`.
//! Denials of the hidden surface are indistinguishable from unknown pages.

pub mod admin_blocker;
pub mod authorize;
pub mod client;
pub mod headers;
pub mod ip_policy;
pub mod path_classifier;
pub mod portal_guard;
pub mod rate_limit;
pub mod session_guard;

pub use authorize::{authorize, Guard, Requirement};
pub use client::ClientInfo;
pub use path_classifier::{classify, PathClass};
pub use rate_limit::{RateCounter, RateLimiter};
pub use session_guard::CurrentSession;
