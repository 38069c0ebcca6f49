//! Random selection among eligible callers.

use tracing::{debug, info};

use crate::directory::{CallerDirectory, DirectoryError};
use crate::eligibility::{EligibilityView, EligibleCaller};

/// Re-picks allowed when a concurrent draw takes the chosen caller first.
const MAX_PICK_ATTEMPTS: usize = 5;

#[derive(Debug, thiserror::Error)]
pub enum DrawError {
    #[error("No eligible callers")]
    NoEligibleCallers,

    #[error(transparent)]
    Directory(#[from] DirectoryError),
}

#[derive(Clone)]
pub struct Draw {
    view: EligibilityView,
    directory: CallerDirectory,
}

impl Draw {
    pub fn new(directory: CallerDirectory) -> Self {
        Self {
            view: EligibilityView::new(directory.clone()),
            directory,
        }
    }

    pub const fn view(&self) -> &EligibilityView {
        &self.view
    }

    /// Pick one eligible caller uniformly at random and mark it selected.
    pub async fn pick(&self) -> Result<EligibleCaller, DrawError> {
        for attempt in 1..=MAX_PICK_ATTEMPTS {
            let mut eligible = self.view.eligible_for_draw().await?;
            if eligible.is_empty() {
                return Err(DrawError::NoEligibleCallers);
            }

            let chosen = eligible.swap_remove(rand::random_range(0..eligible.len()));
            if self.directory.mark_selected(&chosen.id).await? {
                info!(caller_id = %chosen.id, pool = eligible.len() + 1, "Caller selected");
                return Ok(chosen);
            }
            debug!(caller_id = %chosen.id, attempt, "Caller taken by a concurrent draw, re-picking");
        }

        Err(DrawError::NoEligibleCallers)
    }
}
