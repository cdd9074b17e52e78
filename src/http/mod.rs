//! HTTP surface of the gate.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (router, middleware stack, background tasks)
//!     → request.rs (request ID)
//!     → security stages (see crate::security)
//!     → portal handlers (crate::admin) or the upstream router
//!     → response.rs (GateError rendering)
//! ```

pub mod request;
pub mod response;
pub mod server;
pub mod state;

pub use request::X_REQUEST_ID;
pub use response::GateError;
pub use server::{GateServer, GateServerBuilder};
pub use state::GateState;
