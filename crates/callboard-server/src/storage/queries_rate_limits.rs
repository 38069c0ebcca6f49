//! Fixed-window counter queries backing the shared rate-limit store.

use super::db::{CallerDatabase, DatabaseError};

/// Counter state after an accepted attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateSlot {
    pub attempts: i64,
    pub expires_at: i64,
}

// A fresh or expired key restarts at 1 with a new expiry; a live key is only
// incremented while below the limit, and its expiry is never moved.
const ACQUIRE_SLOT_SQL: &str = "INSERT INTO rate_limits (key, attempts, expires_at) VALUES (?, 1, ?) \
     ON CONFLICT(key) DO UPDATE SET \
       attempts = CASE WHEN rate_limits.expires_at <= ? THEN 1 ELSE rate_limits.attempts + 1 END, \
       expires_at = CASE WHEN rate_limits.expires_at <= ? THEN excluded.expires_at ELSE rate_limits.expires_at END \
     WHERE rate_limits.expires_at <= ? OR rate_limits.attempts < ? \
     RETURNING attempts, expires_at";

impl CallerDatabase {
    /// Atomically take one slot in the window for `key`.
    ///
    /// Returns `None` when the window is already full; the rejected attempt
    /// leaves the counter untouched.
    pub async fn acquire_rate_slot(
        &self,
        key: &str,
        max_attempts: i64,
        window_secs: i64,
        now: i64,
    ) -> Result<Option<RateSlot>, DatabaseError> {
        let row: Option<(i64, i64)> = sqlx::query_as(ACQUIRE_SLOT_SQL)
            .bind(key)
            .bind(now + window_secs)
            .bind(now)
            .bind(now)
            .bind(now)
            .bind(max_attempts)
            .fetch_optional(self.pool())
            .await?;

        Ok(row.map(|(attempts, expires_at)| RateSlot {
            attempts,
            expires_at,
        }))
    }

    /// Hand back one attempt on the live window for `key`. Returns `false`
    /// when there was nothing to release.
    pub async fn release_rate_slot(&self, key: &str, now: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "UPDATE rate_limits SET attempts = attempts - 1 \
             WHERE key = ? AND expires_at > ? AND attempts > 0",
        )
        .bind(key)
        .bind(now)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Expiry of the live window for `key`, if any.
    pub async fn rate_limit_expiry(&self, key: &str, now: i64) -> Result<Option<i64>, DatabaseError> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT expires_at FROM rate_limits WHERE key = ? AND expires_at > ?")
                .bind(key)
                .bind(now)
                .fetch_optional(self.pool())
                .await?;

        Ok(row.map(|r| r.0))
    }

    /// Delete windows that have expired.
    pub async fn purge_expired_rate_limits(&self, now: i64) -> Result<u64, DatabaseError> {
        let result = sqlx::query("DELETE FROM rate_limits WHERE expires_at <= ?")
            .bind(now)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }
}
