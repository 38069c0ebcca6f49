//! Security audit trail for admission decisions.
//!
//! Every decision the admission pipeline takes is written here as a
//! structured event on the `callboard::security` tracing target, for log
//! aggregation to pick up. Nothing in the server reads these back.
//!
//! Records carry the masked national ID only.

use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::identity::mask_national_id;

pub const AUDIT_TARGET: &str = "callboard::security";

/// Which limit rejected a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitScope {
    Identity,
    Origin,
}

impl RateLimitScope {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Identity => "identity",
            Self::Origin => "origin",
        }
    }
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One admission decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEvent {
    /// Passed both rate limits; `intent` is the submitter's stated intent.
    Attempt { intent: &'static str },
    /// Identity resolved before mutation.
    Lookup { existed: bool },
    Success {
        created: bool,
        per_identity_hits: i64,
        global_total_hits: i64,
    },
    RateLimited {
        scope: RateLimitScope,
        retry_after_secs: u64,
    },
    Denied { reason: String },
    /// Storage or unexpected failure after the rate limits passed.
    LookupFailed { error: String },
}

impl AuditEvent {
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Attempt { .. } => "attempt",
            Self::Lookup { .. } => "lookup",
            Self::Success { .. } => "success",
            Self::RateLimited { .. } => "rate_limited",
            Self::Denied { .. } => "denied",
            Self::LookupFailed { .. } => "lookup_failed",
        }
    }
}

/// An event together with who it concerns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub masked_national_id: String,
    pub origin: String,
    pub event: AuditEvent,
}

/// Destination for audit records.
pub trait AuditSink: Send + Sync {
    fn emit(&self, record: &AuditRecord);
}

/// Writes records as `tracing` events.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl AuditSink for TracingSink {
    fn emit(&self, record: &AuditRecord) {
        let subject = record.masked_national_id.as_str();
        let origin = record.origin.as_str();
        let kind = record.event.kind();

        match &record.event {
            AuditEvent::Attempt { intent } => {
                info!(target: AUDIT_TARGET, event = kind, subject, origin, intent, "Registration attempt");
            }
            AuditEvent::Lookup { existed } => {
                info!(target: AUDIT_TARGET, event = kind, subject, origin, existed, "Caller lookup");
            }
            AuditEvent::Success {
                created,
                per_identity_hits,
                global_total_hits,
            } => {
                info!(
                    target: AUDIT_TARGET,
                    event = kind,
                    subject,
                    origin,
                    created,
                    per_identity_hits,
                    global_total_hits,
                    "Registration accepted"
                );
            }
            AuditEvent::RateLimited {
                scope,
                retry_after_secs,
            } => {
                warn!(
                    target: AUDIT_TARGET,
                    event = kind,
                    subject,
                    origin,
                    scope = scope.as_str(),
                    retry_after_secs,
                    "Registration rate limited"
                );
            }
            AuditEvent::Denied { reason } => {
                warn!(target: AUDIT_TARGET, event = kind, subject, origin, %reason, "Registration denied");
            }
            AuditEvent::LookupFailed { error } => {
                error!(target: AUDIT_TARGET, event = kind, subject, origin, %error, "Caller lookup failed");
            }
        }
    }
}

/// Write-only audit log handle.
#[derive(Clone)]
pub struct SecurityAuditLog {
    sink: Arc<dyn AuditSink>,
}

impl Default for SecurityAuditLog {
    fn default() -> Self {
        Self::new(Arc::new(TracingSink))
    }
}

impl SecurityAuditLog {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Record `event` for the given national ID, which is masked here.
    pub fn record(&self, national_id: &str, origin: &str, event: AuditEvent) {
        self.sink.emit(&AuditRecord {
            masked_national_id: mask_national_id(national_id),
            origin: origin.to_string(),
            event,
        });
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;

    use super::{AuditRecord, AuditSink};

    /// Keeps records in memory for assertions.
    #[derive(Default)]
    pub struct MemorySink {
        records: Mutex<Vec<AuditRecord>>,
    }

    impl MemorySink {
        pub fn records(&self) -> Vec<AuditRecord> {
            self.records.lock().unwrap().clone()
        }

        pub fn kinds(&self) -> Vec<&'static str> {
            self.records().iter().map(|r| r.event.kind()).collect()
        }
    }

    impl AuditSink for MemorySink {
        fn emit(&self, record: &AuditRecord) {
            self.records.lock().unwrap().push(record.clone());
        }
    }
}
