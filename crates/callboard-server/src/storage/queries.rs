//! Caller queries for the Callboard server.

use callboard_core::db::{start_of_utc_day, unix_timestamp};

use super::db::{CallerDatabase, DatabaseError};
use super::models::{Caller, CallerStatus, QuickStats};

/// Column values for a caller created by its first accepted submission.
#[derive(Debug, Clone, Copy)]
pub struct NewCaller<'a> {
    pub id: &'a str,
    pub national_id: &'a str,
    pub national_id_hash: &'a str,
    pub name: &'a str,
    pub phone: &'a str,
    pub is_family: bool,
    pub origin_address: Option<&'a str>,
}

const INCREMENT_CALLER_SQL: &str = "UPDATE callers SET name = ?, phone = ?, \
     participation_count = participation_count + 1, \
     origin_address = COALESCE(origin_address, ?), updated_at = ? \
     WHERE national_id_hash = ? AND deleted_at IS NULL RETURNING *";

const INSERT_CALLER_SQL: &str = "INSERT INTO callers \
     (id, national_id, national_id_hash, name, phone, participation_count, status, \
      is_family, origin_address, created_at, updated_at) \
     VALUES (?, ?, ?, ?, ?, 1, 'active', ?, ?, ?, ?) RETURNING *";

impl CallerDatabase {
    // =========================================================================
    // Identity resolution
    // =========================================================================

    /// Find the live caller owning a national ID hash.
    pub async fn find_caller_by_hash(
        &self,
        national_id_hash: &str,
    ) -> Result<Option<Caller>, DatabaseError> {
        let caller = sqlx::query_as::<_, Caller>(
            "SELECT * FROM callers WHERE national_id_hash = ? AND deleted_at IS NULL",
        )
        .bind(national_id_hash)
        .fetch_optional(self.pool())
        .await?;

        Ok(caller)
    }

    /// Get a live caller by ID.
    pub async fn get_caller(&self, id: &str) -> Result<Caller, DatabaseError> {
        sqlx::query_as::<_, Caller>("SELECT * FROM callers WHERE id = ? AND deleted_at IS NULL")
            .bind(id)
            .fetch_optional(self.pool())
            .await?
            .ok_or_else(|| DatabaseError::NotFound(format!("Caller {id}")))
    }

    /// Count rows (deleted or not) sharing a national ID hash.
    pub async fn count_callers_with_hash(&self, national_id_hash: &str) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM callers WHERE national_id_hash = ?")
            .bind(national_id_hash)
            .fetch_one(self.pool())
            .await?;

        Ok(row.0)
    }

    // =========================================================================
    // Admission mutation
    // =========================================================================

    /// Increment the live caller for `new.national_id_hash`, or insert it.
    ///
    /// Runs in one transaction. The increment is done in SQL so concurrent
    /// writers never lose a hit. The origin address is only written while it
    /// is still NULL. Returns `(caller, true)` when the row was inserted.
    ///
    /// A concurrent insert of the same identity surfaces as
    /// [`DatabaseError::Conflict`]; the caller is expected to retry.
    pub async fn increment_or_insert_caller(
        &self,
        new: &NewCaller<'_>,
    ) -> Result<(Caller, bool), DatabaseError> {
        let now = unix_timestamp();
        let mut tx = self.pool().begin().await?;

        let updated = sqlx::query_as::<_, Caller>(INCREMENT_CALLER_SQL)
            .bind(new.name)
            .bind(new.phone)
            .bind(new.origin_address)
            .bind(now)
            .bind(new.national_id_hash)
            .fetch_optional(&mut *tx)
            .await?;

        if let Some(caller) = updated {
            tx.commit().await?;
            return Ok((caller, false));
        }

        let created = sqlx::query_as::<_, Caller>(INSERT_CALLER_SQL)
            .bind(new.id)
            .bind(new.national_id)
            .bind(new.national_id_hash)
            .bind(new.name)
            .bind(new.phone)
            .bind(new.is_family)
            .bind(new.origin_address)
            .bind(now)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok((created, true))
    }

    /// Sum of `participation_count` over live callers.
    pub async fn total_hits(&self) -> Result<i64, DatabaseError> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COALESCE(SUM(participation_count), 0) FROM callers WHERE deleted_at IS NULL",
        )
        .fetch_one(self.pool())
        .await?;

        Ok(row.0)
    }

    // =========================================================================
    // Draw
    // =========================================================================

    /// Live callers that were neither selected nor won.
    pub async fn eligible_callers(&self) -> Result<Vec<Caller>, DatabaseError> {
        let callers = sqlx::query_as::<_, Caller>(
            "SELECT * FROM callers WHERE is_selected = 0 AND is_winner = 0 AND deleted_at IS NULL",
        )
        .fetch_all(self.pool())
        .await?;

        Ok(callers)
    }

    /// Mark a caller selected if it is still eligible. Returns `false` when
    /// another draw got there first or the caller is gone.
    pub async fn mark_selected(&self, id: &str) -> Result<bool, DatabaseError> {
        let now = unix_timestamp();

        let result = sqlx::query(
            "UPDATE callers SET is_selected = 1, updated_at = ? \
             WHERE id = ? AND is_selected = 0 AND is_winner = 0 AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Mark a selected caller as winner. Returns `false` if the caller is not
    /// (or no longer) selected.
    pub async fn mark_winner(&self, id: &str) -> Result<bool, DatabaseError> {
        let now = unix_timestamp();

        let result = sqlx::query(
            "UPDATE callers SET is_winner = 1, updated_at = ? \
             WHERE id = ? AND is_selected = 1 AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    // =========================================================================
    // Admin
    // =========================================================================

    /// Update caller status.
    pub async fn set_caller_status(
        &self,
        id: &str,
        status: CallerStatus,
    ) -> Result<bool, DatabaseError> {
        let now = unix_timestamp();

        let result = sqlx::query(
            "UPDATE callers SET status = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(status.as_str())
        .bind(now)
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Soft-delete a caller, releasing its national ID.
    pub async fn soft_delete_caller(&self, id: &str) -> Result<bool, DatabaseError> {
        let now = unix_timestamp();

        let result = sqlx::query(
            "UPDATE callers SET deleted_at = ?, updated_at = ? WHERE id = ? AND deleted_at IS NULL",
        )
        .bind(now)
        .bind(now)
        .bind(id)
        .execute(self.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Aggregate counts for the dashboard header.
    pub async fn quick_stats(&self) -> Result<QuickStats, DatabaseError> {
        let today = start_of_utc_day(unix_timestamp());

        let row: (i64, i64, i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), \
                    COALESCE(SUM(participation_count), 0), \
                    COALESCE(SUM(CASE WHEN created_at >= ? THEN 1 ELSE 0 END), 0), \
                    COALESCE(SUM(is_winner), 0) \
             FROM callers WHERE deleted_at IS NULL",
        )
        .bind(today)
        .fetch_one(self.pool())
        .await?;

        Ok(QuickStats {
            total_callers: row.0,
            total_hits: row.1,
            today_callers: row.2,
            total_winners: row.3,
        })
    }
}
