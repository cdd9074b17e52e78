//! TOTP second factor.
//!
//! The capability is optional and resolved once at startup. Callers that
//! find it absent for a user who has 2FA enabled must deny, never skip.

use std::sync::Arc;

use rand::Rng;
use totp_rs::{Algorithm, Secret, TOTP};

use crate::auth::AuthError;
use crate::config::TwoFactorConfig;

pub const BACKUP_CODE_COUNT: usize = 8;
const BACKUP_CODE_LEN: usize = 8;

pub trait TwoFactor: Send + Sync {
    /// A new base32 secret.
    fn generate_secret(&self) -> Result<String, AuthError>;

    /// `otpauth://` URI for authenticator apps.
    fn provisioning_uri(&self, secret: &str, account: &str) -> Result<String, AuthError>;

    /// Check a code against the current time step (±1 step).
    fn verify(&self, secret: &str, code: &str, account: &str) -> Result<bool, AuthError>;
}

/// RFC 6238 TOTP: SHA1, 6 digits, 30 second step.
pub struct TotpVerifier {
    issuer: String,
}

impl TotpVerifier {
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
        }
    }

    fn totp(&self, secret: &str, account: &str) -> Result<TOTP, AuthError> {
        let bytes = Secret::Encoded(secret.to_string())
            .to_bytes()
            .map_err(|e| AuthError::Crypto(format!("TOTP secret: {e}")))?;

        TOTP::new(
            Algorithm::SHA1,
            6,
            1,
            30,
            bytes,
            Some(self.issuer.clone()),
            account.to_string(),
        )
        .map_err(|e| AuthError::Crypto(format!("TOTP init: {e}")))
    }
}

impl TwoFactor for TotpVerifier {
    fn generate_secret(&self) -> Result<String, AuthError> {
        match Secret::generate_secret().to_encoded() {
            Secret::Encoded(secret) => Ok(secret),
            Secret::Raw(_) => Err(AuthError::Crypto("secret encoding failed".into())),
        }
    }

    fn provisioning_uri(&self, secret: &str, account: &str) -> Result<String, AuthError> {
        Ok(self.totp(secret, account)?.get_url())
    }

    fn verify(&self, secret: &str, code: &str, account: &str) -> Result<bool, AuthError> {
        let code = code.trim();
        if code.len() != 6 || !code.bytes().all(|b| b.is_ascii_digit()) {
            return Ok(false);
        }
        self.totp(secret, account)?
            .check_current(code)
            .map_err(|e| AuthError::Crypto(format!("TOTP check: {e}")))
    }
}

/// The configured capability, or `None` when 2FA is switched off.
pub fn resolve(config: &TwoFactorConfig) -> Option<Arc<dyn TwoFactor>> {
    if config.enabled {
        Some(Arc::new(TotpVerifier::new(config.issuer.clone())))
    } else {
        tracing::warn!("Two-factor capability disabled; accounts with 2FA enabled cannot log in");
        None
    }
}

/// Single-use recovery codes: uppercase hex, 8 characters each.
pub fn generate_backup_codes() -> Vec<String> {
    let mut rng = rand::thread_rng();
    (0..BACKUP_CODE_COUNT)
        .map(|_| {
            (0..BACKUP_CODE_LEN)
                .map(|_| char::from_digit(rng.gen_range(0..16), 16).unwrap_or('0'))
                .collect::<String>()
                .to_uppercase()
        })
        .collect()
}
