//! End-to-end handling of one public submission.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use callboard_core::config::{LimitsConfig, WindowLimit};
use serde::Serialize;
use tracing::{error, info, instrument, warn};

use crate::audit::{AuditEvent, RateLimitScope, SecurityAuditLog};
use crate::directory::{CallerDirectory, DirectoryError, SubmissionData};
use crate::identity::{hash_national_id, mask_national_id};
use crate::ratelimit::{RateDecision, RateLimitCounter};

use super::error::AdmissionError;
use super::policy::{AdmissionPolicy, MutationIntent, PolicyDecision, intent_narrative};
use super::request::{RawSubmission, RegistrationKind, SubmissionRequest};

/// Response payload of an accepted submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionResult {
    pub name: String,
    pub registration_kind: RegistrationKind,
    pub national_id: String,
    pub per_identity_hits: i64,
    pub global_total_hits: i64,
    #[serde(skip)]
    pub created: bool,
}

/// Rate limits, identity resolution, policy and mutation for submissions.
#[derive(Clone)]
pub struct AdmissionPipeline {
    limiter: RateLimitCounter,
    directory: CallerDirectory,
    audit: SecurityAuditLog,
    policy: Arc<dyn AdmissionPolicy>,
    limits: LimitsConfig,
    phase_timeout: Duration,
}

/// Failure inside the directory phase, before it is audited.
enum PhaseFailure {
    Denied(String),
    Directory(DirectoryError),
    TimedOut,
}

impl From<DirectoryError> for PhaseFailure {
    fn from(e: DirectoryError) -> Self {
        Self::Directory(e)
    }
}

fn identity_key(national_id: &str) -> String {
    format!("create:{}", hash_national_id(national_id))
}

fn origin_key(origin: &str) -> String {
    format!("create-origin:{origin}")
}

impl AdmissionPipeline {
    pub fn new(
        limiter: RateLimitCounter,
        directory: CallerDirectory,
        audit: SecurityAuditLog,
        policy: Arc<dyn AdmissionPolicy>,
        limits: LimitsConfig,
        phase_timeout: Duration,
    ) -> Self {
        Self {
            limiter,
            directory,
            audit,
            policy,
            limits,
            phase_timeout,
        }
    }

    pub const fn directory(&self) -> &CallerDirectory {
        &self.directory
    }

    /// Validate a raw payload and submit it.
    pub async fn submit_raw(
        &self,
        raw: RawSubmission,
        origin_address: String,
    ) -> Result<SubmissionResult, AdmissionError> {
        let request = raw
            .validate(origin_address)
            .map_err(AdmissionError::ValidationFailed)?;
        self.submit(&request).await
    }

    /// Admit one validated submission.
    ///
    /// Both rate limits are taken before the directory is touched, so a
    /// failure later on can waste a slot but never mutate a caller without
    /// counting it. An origin rejection hands the identity slot back.
    #[instrument(
        skip_all,
        fields(subject = %mask_national_id(&request.national_id), origin = %request.origin_address)
    )]
    pub async fn submit(
        &self,
        request: &SubmissionRequest,
    ) -> Result<SubmissionResult, AdmissionError> {
        let national_id = request.national_id.as_str();
        let origin = request.origin_address.as_str();
        let intent = intent_narrative(request.is_new_submission, request.increment_if_exists);

        let identity_slot = identity_key(national_id);
        self.enforce_limit(
            RateLimitScope::Identity,
            &identity_slot,
            self.limits.identity,
            request,
        )
        .await?;
        if let Err(e) = self
            .enforce_limit(
                RateLimitScope::Origin,
                &origin_key(origin),
                self.limits.origin,
                request,
            )
            .await
        {
            self.release_slot(&identity_slot).await;
            return Err(e);
        }

        self.audit
            .record(national_id, origin, AuditEvent::Attempt { intent });

        let outcome = match tokio::time::timeout(self.phase_timeout, self.admit(request)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(PhaseFailure::TimedOut),
        };

        let (result, global_total_hits) = outcome.map_err(|failure| self.fail(request, failure))?;

        self.audit.record(
            national_id,
            origin,
            AuditEvent::Success {
                created: result.created,
                per_identity_hits: result.per_identity_hits,
                global_total_hits,
            },
        );
        info!(
            created = result.created,
            per_identity_hits = result.per_identity_hits,
            global_total_hits,
            "Submission accepted"
        );

        Ok(result)
    }

    async fn enforce_limit(
        &self,
        scope: RateLimitScope,
        key: &str,
        limit: WindowLimit,
        request: &SubmissionRequest,
    ) -> Result<(), AdmissionError> {
        let window = Duration::from_secs(limit.window_secs);
        let check = self
            .limiter
            .check_and_increment(key, limit.max_attempts, window);

        let decision = match with_timeout(self.phase_timeout, check).await {
            Some(Ok(decision)) => decision,
            Some(Err(e)) => {
                error!(scope = %scope, error = %e, "Rate limit check failed, rejecting");
                return Err(AdmissionError::RateLimitStoreUnavailable);
            }
            None => {
                error!(scope = %scope, "Rate limit check timed out, rejecting");
                return Err(AdmissionError::RateLimitStoreUnavailable);
            }
        };

        match decision {
            RateDecision::Allowed { .. } => Ok(()),
            RateDecision::Exceeded { retry_after } => {
                self.audit.record(
                    &request.national_id,
                    &request.origin_address,
                    AuditEvent::RateLimited {
                        scope,
                        retry_after_secs: retry_after.as_secs(),
                    },
                );
                Err(AdmissionError::RateLimited { scope, retry_after })
            }
        }
    }

    /// Return a slot taken for a request that was then rejected. Failures are
    /// logged, not returned.
    async fn release_slot(&self, key: &str) {
        match with_timeout(self.phase_timeout, self.limiter.release(key)).await {
            Some(Ok(())) => {}
            Some(Err(e)) => warn!(error = %e, "Failed to release rate limit slot"),
            None => warn!("Releasing rate limit slot timed out"),
        }
    }

    /// Lookup, policy, mutation and the fresh global total.
    async fn admit(
        &self,
        request: &SubmissionRequest,
    ) -> Result<(SubmissionResult, i64), PhaseFailure> {
        let national_id = request.national_id.as_str();
        let origin = request.origin_address.as_str();

        let existing = self.directory.find_by_national_id(national_id).await?;
        self.audit.record(
            national_id,
            origin,
            AuditEvent::Lookup {
                existed: existing.is_some(),
            },
        );

        let intent = MutationIntent {
            national_id,
            kind: request.kind,
            is_new_submission: request.is_new_submission,
            increment_if_exists: request.increment_if_exists,
            existing: existing.as_ref(),
        };
        if let PolicyDecision::Denied(reason) = self.policy.evaluate(&intent) {
            return Err(PhaseFailure::Denied(reason));
        }

        let data = SubmissionData {
            national_id: request.national_id.clone(),
            name: request.name.clone(),
            phone: request.phone.clone(),
            is_family: request.kind == RegistrationKind::Family,
            origin_address: Some(request.origin_address.clone()),
            force_new: request.is_new_submission,
            increment_if_exists: request.increment_if_exists,
        };
        let (caller, created) = self.directory.create_or_increment(&data).await?;
        let global_total_hits = self.directory.total_hits().await?;

        let result = SubmissionResult {
            name: caller.name,
            registration_kind: request.kind,
            national_id: caller.national_id,
            per_identity_hits: caller.participation_count,
            global_total_hits,
            created,
        };
        Ok((result, global_total_hits))
    }

    /// Audit a failed directory phase and turn it into the outward error.
    fn fail(&self, request: &SubmissionRequest, failure: PhaseFailure) -> AdmissionError {
        let national_id = request.national_id.as_str();
        let origin = request.origin_address.as_str();

        match failure {
            PhaseFailure::Denied(reason) => {
                self.audit
                    .record(national_id, origin, AuditEvent::Denied { reason: reason.clone() });
                AdmissionError::Denied(reason)
            }
            PhaseFailure::TimedOut => {
                error!("Caller directory timed out");
                self.audit.record(
                    national_id,
                    origin,
                    AuditEvent::LookupFailed {
                        error: "timed out".into(),
                    },
                );
                AdmissionError::PersistenceUnavailable
            }
            PhaseFailure::Directory(e) => {
                error!(error = %e, "Caller directory failed");
                self.audit.record(
                    national_id,
                    origin,
                    AuditEvent::LookupFailed {
                        error: e.to_string(),
                    },
                );
                match e {
                    DirectoryError::PersistenceUnavailable(_) => {
                        AdmissionError::PersistenceUnavailable
                    }
                    _ => AdmissionError::LookupFailed,
                }
            }
        }
    }
}

async fn with_timeout<F: Future>(limit: Duration, fut: F) -> Option<F::Output> {
    tokio::time::timeout(limit, fut).await.ok()
}
