//! Shared expiring cache.
//!
//! Backs the per-IP failure counters and session activity timestamps. Entries
//! carry their own deadline; reads treat an expired entry as absent and
//! `purge_expired` reclaims memory in the background.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct CacheEntry<V> {
    value: V,
    expires_at: Instant,
}

impl<V> CacheEntry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at <= now
    }
}

/// A thread-safe key/value cache with per-entry expiry.
#[derive(Debug)]
pub struct ExpiringCache<V> {
    inner: Arc<DashMap<String, CacheEntry<V>>>,
}

impl<V> Clone for ExpiringCache<V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<V> Default for ExpiringCache<V> {
    fn default() -> Self {
        Self {
            inner: Arc::new(DashMap::new()),
        }
    }
}

impl<V: Clone> ExpiringCache<V> {
    /// Create a new empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a live value.
    pub fn get(&self, key: &str) -> Option<V> {
        self.get_with_expiry(key).map(|(value, _)| value)
    }

    /// Get a live value together with its deadline.
    pub fn get_with_expiry(&self, key: &str) -> Option<(V, Instant)> {
        let now = Instant::now();
        {
            let entry = self.inner.get(key)?;
            if !entry.is_expired(now) {
                return Some((entry.value.clone(), entry.expires_at));
            }
        }
        self.inner.remove_if(key, |_, entry| entry.is_expired(now));
        None
    }

    /// Insert or replace a value with a fresh time-to-live.
    pub fn set(&self, key: impl Into<String>, value: V, ttl: Duration) {
        self.inner.insert(
            key.into(),
            CacheEntry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
    }

    /// Remove a key. Returns whether a live entry was removed.
    pub fn delete(&self, key: &str) -> bool {
        let now = Instant::now();
        self.inner
            .remove(key)
            .map(|(_, entry)| !entry.is_expired(now))
            .unwrap_or(false)
    }

    /// Drop every expired entry. Returns how many were dropped.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.inner.len();
        self.inner.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.inner.len())
    }

    /// Number of stored entries, including ones not yet purged.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

impl ExpiringCache<u32> {
    /// Increment a counter inside a fixed window.
    ///
    /// The window opens with the first increment and is not extended by
    /// later ones. Returns the new count and the window deadline.
    pub fn increment(&self, key: impl Into<String>, window: Duration) -> (u32, Instant) {
        let now = Instant::now();
        let mut entry = self.inner.entry(key.into()).or_insert(CacheEntry {
            value: 0,
            expires_at: now + window,
        });

        if entry.is_expired(now) {
            entry.value = 0;
            entry.expires_at = now + window;
        }
        entry.value = entry.value.saturating_add(1);
        (entry.value, entry.expires_at)
    }
}
