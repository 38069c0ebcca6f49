//! Admission outcomes other than success.

use std::time::Duration;

use crate::audit::RateLimitScope;

use super::request::ValidationErrors;

#[derive(Debug, thiserror::Error)]
pub enum AdmissionError {
    #[error("Validation failed: {0}")]
    ValidationFailed(ValidationErrors),

    #[error("Rate limited ({scope}), retry after {}s", .retry_after.as_secs())]
    RateLimited {
        scope: RateLimitScope,
        retry_after: Duration,
    },

    #[error("Admission denied: {0}")]
    Denied(String),

    #[error("Persistence unavailable")]
    PersistenceUnavailable,

    #[error("Rate limit store unavailable")]
    RateLimitStoreUnavailable,

    #[error("Lookup failed")]
    LookupFailed,
}

impl AdmissionError {
    /// Message safe to show the submitter.
    pub fn user_message(&self) -> String {
        match self {
            Self::ValidationFailed(_) => "The given data was invalid.".to_string(),
            Self::RateLimited { scope, retry_after } => {
                let minutes = retry_after.as_secs().div_ceil(60).max(1);
                let unit = if minutes == 1 { "minute" } else { "minutes" };
                match scope {
                    RateLimitScope::Identity => format!(
                        "You have already registered recently. Please try again in {minutes} {unit}."
                    ),
                    RateLimitScope::Origin => format!(
                        "Too many registrations from your network. Please try again in {minutes} {unit}."
                    ),
                }
            }
            Self::Denied(_) => "This registration cannot be accepted.".to_string(),
            Self::PersistenceUnavailable | Self::RateLimitStoreUnavailable | Self::LookupFailed => {
                "Something went wrong. Please try again later.".to_string()
            }
        }
    }
}
