//! Inbound submission payload and its validation.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const MAX_NAME_LEN: usize = 255;
pub const MAX_NATIONAL_ID_LEN: usize = 255;
pub const MAX_PHONE_LEN: usize = 45;

/// Whether the caller registers alone or for a household.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationKind {
    Individual,
    Family,
}

impl RegistrationKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Individual => "individual",
            Self::Family => "family",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "individual" => Some(Self::Individual),
            "family" => Some(Self::Family),
            _ => None,
        }
    }
}

/// Submission as received. Every field is optional here so that missing
/// fields are reported per field instead of failing deserialization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawSubmission {
    pub name: Option<String>,
    pub national_id: Option<String>,
    pub phone: Option<String>,
    pub registration_kind: Option<String>,
    pub is_new_submission: Option<bool>,
    pub increment_if_exists: Option<bool>,
}

/// A validated submission, with the origin taken from the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub name: String,
    pub national_id: String,
    pub phone: String,
    pub kind: RegistrationKind,
    pub is_new_submission: bool,
    pub increment_if_exists: bool,
    pub origin_address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

/// Every field that failed validation.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(pub Vec<FieldError>);

impl ValidationErrors {
    fn push(&mut self, field: &'static str, message: impl Into<String>) {
        self.0.push(FieldError {
            field,
            message: message.into(),
        });
    }

    pub fn fields(&self) -> Vec<&'static str> {
        self.0.iter().map(|e| e.field).collect()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields = self.fields().join(", ");
        write!(f, "invalid fields: {fields}")
    }
}

fn required_text(
    errors: &mut ValidationErrors,
    field: &'static str,
    value: Option<String>,
    max_len: usize,
) -> String {
    let value = value.map(|v| v.trim().to_string()).unwrap_or_default();
    if value.is_empty() {
        errors.push(field, format!("The {field} field is required."));
    } else if value.chars().count() > max_len {
        errors.push(
            field,
            format!("The {field} field must not be greater than {max_len} characters."),
        );
    }
    value
}

impl RawSubmission {
    /// Validate the payload. `origin_address` comes from the connection, not
    /// from the submitter.
    pub fn validate(self, origin_address: String) -> Result<SubmissionRequest, ValidationErrors> {
        let mut errors = ValidationErrors::default();

        let name = required_text(&mut errors, "name", self.name, MAX_NAME_LEN);
        let national_id =
            required_text(&mut errors, "nationalId", self.national_id, MAX_NATIONAL_ID_LEN);
        let phone = required_text(&mut errors, "phone", self.phone, MAX_PHONE_LEN);

        let kind = match self.registration_kind.as_deref().map(str::trim) {
            None | Some("") => {
                errors.push("registrationKind", "The registrationKind field is required.");
                None
            }
            Some(raw) => {
                let kind = RegistrationKind::parse(raw);
                if kind.is_none() {
                    errors.push(
                        "registrationKind",
                        "The selected registrationKind is invalid. Expected individual or family.",
                    );
                }
                kind
            }
        };

        match kind {
            Some(kind) if errors.0.is_empty() => Ok(SubmissionRequest {
                name,
                national_id,
                phone,
                kind,
                is_new_submission: self.is_new_submission.unwrap_or(false),
                increment_if_exists: self.increment_if_exists.unwrap_or(false),
                origin_address,
            }),
            _ => Err(errors),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> RawSubmission {
        RawSubmission {
            name: Some("Ali".into()),
            national_id: Some("123".into()),
            phone: Some("555".into()),
            registration_kind: Some("individual".into()),
            is_new_submission: None,
            increment_if_exists: Some(true),
        }
    }

    #[test]
    fn valid_submission_passes() {
        let req = valid().validate("9.9.9.9".into()).unwrap();
        assert_eq!(req.name, "Ali");
        assert_eq!(req.kind, RegistrationKind::Individual);
        assert!(!req.is_new_submission);
        assert!(req.increment_if_exists);
        assert_eq!(req.origin_address, "9.9.9.9");
    }

    #[test]
    fn missing_fields_reported_individually() {
        let err = RawSubmission::default().validate("x".into()).unwrap_err();
        assert_eq!(
            err.fields(),
            vec!["name", "nationalId", "phone", "registrationKind"]
        );
    }

    #[test]
    fn whitespace_only_counts_as_missing() {
        let mut raw = valid();
        raw.name = Some("   ".into());
        let err = raw.validate("x".into()).unwrap_err();
        assert_eq!(err.fields(), vec!["name"]);
    }

    #[test]
    fn enum_mismatch() {
        let mut raw = valid();
        raw.registration_kind = Some("company".into());
        let err = raw.validate("x".into()).unwrap_err();
        assert_eq!(err.fields(), vec!["registrationKind"]);
        assert!(err.0[0].message.contains("invalid"));
    }

    #[test]
    fn max_lengths() {
        let mut raw = valid();
        raw.phone = Some("1".repeat(MAX_PHONE_LEN + 1));
        raw.national_id = Some("A".repeat(MAX_NATIONAL_ID_LEN));
        let err = raw.validate("x".into()).unwrap_err();
        assert_eq!(err.fields(), vec!["phone"]);

        let mut raw = valid();
        raw.name = Some("n".repeat(MAX_NAME_LEN + 1));
        assert_eq!(raw.validate("x".into()).unwrap_err().fields(), vec!["name"]);
    }

    #[test]
    fn alphanumeric_national_id_allowed() {
        let mut raw = valid();
        raw.national_id = Some("AB12cd".into());
        assert!(raw.validate("x".into()).is_ok());
    }

    #[test]
    fn deserializes_camel_case() {
        let raw: RawSubmission = serde_json::from_str(
            r#"{"name":"Ali","nationalId":"123","phone":"555","registrationKind":"family","isNewSubmission":true}"#,
        )
        .unwrap();
        let req = raw.validate("x".into()).unwrap();
        assert_eq!(req.kind, RegistrationKind::Family);
        assert!(req.is_new_submission);
    }
}
