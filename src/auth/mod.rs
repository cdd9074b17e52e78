//! Upstream authentication.
//!
//! The gate never stores credentials itself; it consumes an [`Identity`]
//! from whatever implements [`Authenticator`]. The bundled
//! [`DirectoryAuthenticator`] serves accounts listed in the config file.

pub mod directory;
pub mod identity;
pub mod password;
pub mod two_factor;

use thiserror::Error;

pub use directory::DirectoryAuthenticator;
pub use identity::{Identity, UserId};
pub use two_factor::{TotpVerifier, TwoFactor};

/// Authentication error types.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("cryptography error: {0}")]
    Crypto(String),
}

/// Validates credentials and resolves user identities.
pub trait Authenticator: Send + Sync {
    /// Check a username/password pair.
    fn authenticate(&self, username: &str, password: &str) -> Result<Identity, AuthError>;

    /// Resolve the current identity of a user, if it still exists.
    fn find(&self, id: UserId) -> Option<Identity>;
}
