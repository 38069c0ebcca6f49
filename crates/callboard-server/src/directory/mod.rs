//! Caller identity resolution and persistence.
//!
//! The national ID (through its hash) is the only dedup key: a submission
//! whose national ID matches a live caller always lands on that caller and
//! bumps its hit counter, whatever intent the submitter stated.

use std::time::Duration;

use tracing::{debug, error, warn};

use crate::identity::{hash_national_id, mask_national_id};
use crate::storage::{Caller, CallerDatabase, DatabaseError, NewCaller, QuickStats};

const RETRY_BACKOFF: Duration = Duration::from_millis(10);

/// Input to [`CallerDirectory::create_or_increment`].
#[derive(Debug, Clone)]
pub struct SubmissionData {
    pub national_id: String,
    pub name: String,
    pub phone: String,
    pub is_family: bool,
    pub origin_address: Option<String>,
    /// Submitter claims to be a new caller.
    pub force_new: bool,
    /// Submitter asks for an increment if already registered.
    pub increment_if_exists: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    /// A concurrent writer won the race for the same identity.
    #[error("Concurrent modification")]
    ConcurrentModification,

    #[error("Persistence unavailable: {0}")]
    PersistenceUnavailable(String),

    #[error("Caller not found: {0}")]
    NotFound(String),

    #[error("Caller {0} has not been selected")]
    NotSelected(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<DatabaseError> for DirectoryError {
    fn from(e: DatabaseError) -> Self {
        match e {
            DatabaseError::Conflict(_) => Self::ConcurrentModification,
            DatabaseError::NotFound(what) => Self::NotFound(what),
            e if e.is_unavailable() => Self::PersistenceUnavailable(e.to_string()),
            e => Self::Storage(e.to_string()),
        }
    }
}

/// Identity-keyed access to callers.
#[derive(Clone)]
pub struct CallerDirectory {
    db: CallerDatabase,
    max_retries: u32,
}

impl CallerDirectory {
    pub const fn new(db: CallerDatabase, max_retries: u32) -> Self {
        Self { db, max_retries }
    }

    pub const fn database(&self) -> &CallerDatabase {
        &self.db
    }

    /// Find the live caller registered under `national_id`.
    pub async fn find_by_national_id(
        &self,
        national_id: &str,
    ) -> Result<Option<Caller>, DirectoryError> {
        let hash = hash_national_id(national_id);
        Ok(self.db.find_caller_by_hash(&hash).await?)
    }

    /// Create the caller for `input.national_id`, or count one more hit on it.
    ///
    /// Returns the caller after the mutation and whether it was created.
    /// Lost races are retried up to `max_retries` times and then reported as
    /// [`DirectoryError::PersistenceUnavailable`].
    pub async fn create_or_increment(
        &self,
        input: &SubmissionData,
    ) -> Result<(Caller, bool), DirectoryError> {
        let hash = hash_national_id(&input.national_id);
        let masked = mask_national_id(&input.national_id);

        debug!(
            subject = %masked,
            force_new = input.force_new,
            increment_if_exists = input.increment_if_exists,
            "Resolving caller"
        );

        let mut attempt = 0;
        loop {
            let id = uuid::Uuid::new_v4().to_string();
            let new = NewCaller {
                id: &id,
                national_id: &input.national_id,
                national_id_hash: &hash,
                name: &input.name,
                phone: &input.phone,
                is_family: input.is_family,
                origin_address: input.origin_address.as_deref(),
            };

            match self.db.increment_or_insert_caller(&new).await.map_err(DirectoryError::from) {
                Ok((caller, created)) => {
                    debug!(
                        subject = %masked,
                        caller_id = %caller.id,
                        created,
                        hits = caller.participation_count,
                        "Caller resolved"
                    );
                    return Ok((caller, created));
                }
                Err(DirectoryError::ConcurrentModification) if attempt < self.max_retries => {
                    attempt += 1;
                    warn!(subject = %masked, attempt, "Concurrent registration, retrying");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(DirectoryError::ConcurrentModification) => {
                    error!(subject = %masked, attempts = attempt + 1, "Registration kept conflicting");
                    return Err(DirectoryError::PersistenceUnavailable(
                        "write conflict retries exhausted".into(),
                    ));
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Sum of hits over live callers, computed fresh.
    pub async fn total_hits(&self) -> Result<i64, DirectoryError> {
        Ok(self.db.total_hits().await?)
    }

    /// Mark a caller selected if still eligible.
    pub async fn mark_selected(&self, id: &str) -> Result<bool, DirectoryError> {
        Ok(self.db.mark_selected(id).await?)
    }

    /// Confirm a selected caller as winner.
    pub async fn confirm_winner(&self, id: &str) -> Result<Caller, DirectoryError> {
        if self.db.mark_winner(id).await? {
            return Ok(self.db.get_caller(id).await?);
        }

        // Distinguish an unknown caller from one that was never drawn.
        self.db.get_caller(id).await?;
        Err(DirectoryError::NotSelected(id.to_string()))
    }

    pub async fn quick_stats(&self) -> Result<QuickStats, DirectoryError> {
        Ok(self.db.quick_stats().await?)
    }
}

#[cfg(test)]
mod tests;
