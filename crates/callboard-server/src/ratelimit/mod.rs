//! Fixed-window rate limiting over a pluggable counter store.
//!
//! Semantics shared by every store:
//! - the window's expiry is fixed when its first attempt is counted and is
//!   never pushed back by later attempts;
//! - an attempt that finds the window full is rejected without being
//!   counted, so retries against a full window cost nothing;
//! - check and increment are one atomic store operation;
//! - an attempt counted under one key can be released when a later check
//!   rejects the request, for as long as its window is live.

mod memory;
mod sqlite;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, error};

pub use memory::MemoryCounterStore;
pub use sqlite::SqliteCounterStore;

/// Outcome of one rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateDecision {
    /// The attempt was counted; `attempts` includes it.
    Allowed { attempts: u32 },
    /// The window is full; nothing was counted.
    Exceeded { retry_after: Duration },
}

impl RateDecision {
    pub const fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed { .. })
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CounterStoreError {
    #[error("Counter store unavailable: {0}")]
    Unavailable(String),
}

/// Key/value counter store with per-key expiry.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Count one attempt against `key` unless `max_attempts` were already
    /// counted in the live window.
    async fn acquire(
        &self,
        key: &str,
        max_attempts: u32,
        window: Duration,
    ) -> Result<RateDecision, CounterStoreError>;

    /// Give back one counted attempt on `key` while its window is still live.
    /// Expired or unknown keys are left alone.
    async fn release(&self, key: &str) -> Result<(), CounterStoreError>;

    /// Drop expired windows. Returns how many were removed.
    async fn purge_expired(&self) -> Result<u64, CounterStoreError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("Rate limit store unavailable: {0}")]
    StoreUnavailable(String),
}

/// Rate limiter used by the admission pipeline.
#[derive(Clone)]
pub struct RateLimitCounter {
    store: Arc<dyn CounterStore>,
}

impl RateLimitCounter {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store }
    }

    /// Check `key` against `max_attempts` per `window` and count the attempt
    /// if it fits.
    ///
    /// Store failures are returned as errors; callers must treat them as a
    /// rejection.
    pub async fn check_and_increment(
        &self,
        key: &str,
        max_attempts: u32,
        window: Duration,
    ) -> Result<RateDecision, RateLimitError> {
        if max_attempts == 0 {
            return Ok(RateDecision::Exceeded {
                retry_after: window,
            });
        }

        match self.store.acquire(key, max_attempts, window).await {
            Ok(decision) => {
                debug!(?decision, max_attempts, window_secs = window.as_secs(), "Rate limit checked");
                Ok(decision)
            }
            Err(CounterStoreError::Unavailable(msg)) => {
                error!(error = %msg, "Rate limit store unavailable");
                Err(RateLimitError::StoreUnavailable(msg))
            }
        }
    }

    /// Undo a counted attempt whose request was rejected further along, so
    /// the rejection stays free.
    pub async fn release(&self, key: &str) -> Result<(), RateLimitError> {
        self.store
            .release(key)
            .await
            .map_err(|CounterStoreError::Unavailable(msg)| RateLimitError::StoreUnavailable(msg))
    }

    /// Drop expired windows from the underlying store.
    pub async fn purge_expired(&self) -> Result<u64, RateLimitError> {
        self.store
            .purge_expired()
            .await
            .map_err(|CounterStoreError::Unavailable(msg)| RateLimitError::StoreUnavailable(msg))
    }
}

#[cfg(test)]
mod tests;
