//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events, pretty or JSON)
//!     → metrics.rs (denial, login, session and audit counters)
//!     → spans.rs (one span per HTTP request, tagged with the request ID)
//!
//! Consumers:
//!     → stdout
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
pub mod spans;

pub use logging::init_logging;
pub use spans::RequestSpan;
