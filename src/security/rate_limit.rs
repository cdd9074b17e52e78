//! Failed-login rate limiting.
//!
//! Failures are counted per client IP in a fixed window that opens with the
//! first failure. An IP whose count reaches the configured maximum is locked
//! out until the window expires or a login from it succeeds.

use std::net::IpAddr;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::RateLimitConfig;
use crate::store::ExpiringCache;

/// A snapshot of one IP's failure counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateCounter {
    pub key: String,
    pub count: u32,
    pub window_expiry: Instant,
}

#[derive(Default)]
pub struct RateLimiter {
    counters: ExpiringCache<u32>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Unknown clients share a single bucket.
    fn key(ip: Option<IpAddr>) -> String {
        match ip {
            Some(ip) => format!("login_attempts:{ip}"),
            None => "login_attempts:unknown".to_string(),
        }
    }

    pub fn counter(&self, ip: Option<IpAddr>) -> Option<RateCounter> {
        let key = Self::key(ip);
        self.counters
            .get_with_expiry(&key)
            .map(|(count, window_expiry)| RateCounter {
                key,
                count,
                window_expiry,
            })
    }

    pub fn is_locked(&self, ip: Option<IpAddr>, config: &RateLimitConfig) -> bool {
        self.counter(ip)
            .is_some_and(|counter| counter.count >= config.max_attempts)
    }

    pub fn record_failure(&self, ip: Option<IpAddr>, config: &RateLimitConfig) -> RateCounter {
        let key = Self::key(ip);
        let (count, window_expiry) = self
            .counters
            .increment(key.clone(), Duration::from_secs(config.window_secs));

        if count >= config.max_attempts {
            tracing::warn!(ip = ?ip, count, "Client locked out after repeated login failures");
        } else {
            tracing::debug!(ip = ?ip, count, "Login failure recorded");
        }

        RateCounter {
            key,
            count,
            window_expiry,
        }
    }

    pub fn reset(&self, ip: Option<IpAddr>) {
        self.counters.delete(&Self::key(ip));
    }

    pub fn purge_expired(&self) -> usize {
        self.counters.purge_expired()
    }

    pub fn tracked(&self) -> usize {
        self.counters.len()
    }
}
