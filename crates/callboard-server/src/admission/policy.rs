//! Admission rules evaluated once per submission, before any mutation.

use crate::storage::{Caller, CallerStatus};

use super::request::RegistrationKind;

/// Everything a policy may look at. Policies get no other context.
#[derive(Debug, Clone, Copy)]
pub struct MutationIntent<'a> {
    pub national_id: &'a str,
    pub kind: RegistrationKind,
    pub is_new_submission: bool,
    pub increment_if_exists: bool,
    /// The caller this submission resolves to, if it already exists.
    pub existing: Option<&'a Caller>,
}

impl MutationIntent<'_> {
    /// The submitter's stated intent, for the audit trail.
    pub const fn narrative(&self) -> &'static str {
        intent_narrative(self.is_new_submission, self.increment_if_exists)
    }
}

pub(crate) const fn intent_narrative(is_new_submission: bool, increment_if_exists: bool) -> &'static str {
    match (is_new_submission, increment_if_exists) {
        (_, true) => "increment",
        (true, false) => "new",
        (false, false) => "existing",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyDecision {
    Allowed,
    Denied(String),
}

pub trait AdmissionPolicy: Send + Sync {
    fn evaluate(&self, intent: &MutationIntent<'_>) -> PolicyDecision;
}

/// Admits everyone except callers an admin has blocked.
#[derive(Debug, Default, Clone, Copy)]
pub struct StandardPolicy;

impl AdmissionPolicy for StandardPolicy {
    fn evaluate(&self, intent: &MutationIntent<'_>) -> PolicyDecision {
        match intent.existing {
            Some(caller) if caller.status() == CallerStatus::Blocked => {
                PolicyDecision::Denied("caller is blocked".into())
            }
            _ => PolicyDecision::Allowed,
        }
    }
}
