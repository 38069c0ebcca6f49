//! Admission of public caller submissions.

mod error;
mod pipeline;
mod policy;
mod request;


pub use error::AdmissionError;
pub use pipeline::{AdmissionPipeline, SubmissionResult};
pub use policy::{AdmissionPolicy, MutationIntent, PolicyDecision, StandardPolicy};
pub use request::{
    FieldError, RawSubmission, RegistrationKind, SubmissionRequest, ValidationErrors,
};
