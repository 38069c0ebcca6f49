//! Read-only view of callers still in the running for a draw.

use serde::Serialize;

use crate::directory::{CallerDirectory, DirectoryError};
use crate::storage::Caller;

/// A caller as presented to the draw.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EligibleCaller {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub national_id: String,
    pub participation_count: i64,
}

impl From<Caller> for EligibleCaller {
    fn from(c: Caller) -> Self {
        Self {
            id: c.id,
            name: c.name,
            phone: c.phone,
            national_id: c.national_id,
            participation_count: c.participation_count,
        }
    }
}

#[derive(Clone)]
pub struct EligibilityView {
    directory: CallerDirectory,
}

impl EligibilityView {
    pub const fn new(directory: CallerDirectory) -> Self {
        Self { directory }
    }

    /// Live callers that are neither selected nor winners, in no particular
    /// order.
    pub async fn eligible_for_draw(&self) -> Result<Vec<EligibleCaller>, DirectoryError> {
        let callers = self.directory.database().eligible_callers().await?;
        Ok(callers.into_iter().map(EligibleCaller::from).collect())
    }
}
