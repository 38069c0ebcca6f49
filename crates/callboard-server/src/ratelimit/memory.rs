//! Process-local counter store.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{CounterStore, CounterStoreError, RateDecision};

#[derive(Debug, Clone, Copy)]
struct Window {
    attempts: u32,
    expires_at: Instant,
}

/// Counter store held in memory. Counters are not shared across processes.
#[derive(Debug, Default)]
pub struct MemoryCounterStore {
    windows: Mutex<HashMap<String, Window>>,
}

impl MemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CounterStore for MemoryCounterStore {
    async fn acquire(
        &self,
        key: &str,
        max_attempts: u32,
        window: Duration,
    ) -> Result<RateDecision, CounterStoreError> {
        let now = Instant::now();
        let mut windows = self
            .windows
            .lock()
            .map_err(|e| CounterStoreError::Unavailable(e.to_string()))?;

        if let Some(w) = windows.get_mut(key).filter(|w| w.expires_at > now) {
            if w.attempts >= max_attempts {
                return Ok(RateDecision::Exceeded {
                    retry_after: w.expires_at - now,
                });
            }
            w.attempts += 1;
            return Ok(RateDecision::Allowed {
                attempts: w.attempts,
            });
        }

        windows.insert(
            key.to_string(),
            Window {
                attempts: 1,
                expires_at: now + window,
            },
        );
        Ok(RateDecision::Allowed { attempts: 1 })
    }

    async fn release(&self, key: &str) -> Result<(), CounterStoreError> {
        let now = Instant::now();
        let mut windows = self
            .windows
            .lock()
            .map_err(|e| CounterStoreError::Unavailable(e.to_string()))?;

        if let Some(w) = windows.get_mut(key).filter(|w| w.expires_at > now) {
            w.attempts = w.attempts.saturating_sub(1);
        }
        Ok(())
    }

    async fn purge_expired(&self) -> Result<u64, CounterStoreError> {
        let now = Instant::now();
        let mut windows = self
            .windows
            .lock()
            .map_err(|e| CounterStoreError::Unavailable(e.to_string()))?;

        let before = windows.len();
        windows.retain(|_, w| w.expires_at > now);
        Ok(u64::try_from(before - windows.len()).unwrap_or(u64::MAX))
    }
}
