//! Counter store shared through the SQLite database.

use std::time::Duration;

use async_trait::async_trait;
use callboard_core::db::unix_timestamp;

use super::{CounterStore, CounterStoreError, RateDecision};
use crate::storage::{CallerDatabase, DatabaseError};

/// Counter store on the `rate_limits` table. Every worker using the same
/// database file sees the same windows.
#[derive(Clone)]
pub struct SqliteCounterStore {
    db: CallerDatabase,
}

impl SqliteCounterStore {
    pub const fn new(db: CallerDatabase) -> Self {
        Self { db }
    }
}

fn unavailable(e: DatabaseError) -> CounterStoreError {
    CounterStoreError::Unavailable(e.to_string())
}

#[async_trait]
impl CounterStore for SqliteCounterStore {
    async fn acquire(
        &self,
        key: &str,
        max_attempts: u32,
        window: Duration,
    ) -> Result<RateDecision, CounterStoreError> {
        let now = unix_timestamp();
        let window_secs = i64::try_from(window.as_secs()).unwrap_or(i64::MAX / 2);

        let slot = self
            .db
            .acquire_rate_slot(key, i64::from(max_attempts), window_secs, now)
            .await
            .map_err(unavailable)?;

        if let Some(slot) = slot {
            return Ok(RateDecision::Allowed {
                attempts: u32::try_from(slot.attempts).unwrap_or(u32::MAX),
            });
        }

        // The window may have lapsed between the two statements; report a
        // minimal wait rather than a negative one.
        let expires_at = self
            .db
            .rate_limit_expiry(key, now)
            .await
            .map_err(unavailable)?
            .unwrap_or(now + 1);
        let retry_after = u64::try_from(expires_at - now).unwrap_or(1).max(1);

        Ok(RateDecision::Exceeded {
            retry_after: Duration::from_secs(retry_after),
        })
    }

    async fn release(&self, key: &str) -> Result<(), CounterStoreError> {
        self.db
            .release_rate_slot(key, unix_timestamp())
            .await
            .map(|_| ())
            .map_err(unavailable)
    }

    async fn purge_expired(&self) -> Result<u64, CounterStoreError> {
        self.db
            .purge_expired_rate_limits(unix_timestamp())
            .await
            .map_err(unavailable)
    }
}
