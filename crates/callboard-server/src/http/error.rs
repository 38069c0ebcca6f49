//! Mapping of domain errors onto HTTP responses.

use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::admission::AdmissionError;
use crate::directory::DirectoryError;
use crate::draw::DrawError;

const GENERIC_FAILURE: &str = "Something went wrong. Please try again later.";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Admission(#[from] AdmissionError),

    #[error(transparent)]
    Directory(#[from] DirectoryError),

    #[error(transparent)]
    Draw(#[from] DrawError),

    /// Body could not be parsed as a submission at all.
    #[error("Malformed request body: {0}")]
    MalformedBody(String),
}

fn message(status: StatusCode, text: impl Into<String>) -> Response {
    (status, Json(json!({ "message": text.into() }))).into_response()
}

fn admission_response(err: &AdmissionError) -> Response {
    match err {
        AdmissionError::ValidationFailed(errors) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "message": err.user_message(), "errors": errors })),
        )
            .into_response(),
        AdmissionError::RateLimited { retry_after, .. } => {
            let secs = retry_after.as_secs().max(1);
            let mut resp = message(StatusCode::TOO_MANY_REQUESTS, err.user_message());
            resp.headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
            resp
        }
        AdmissionError::Denied(_) => message(StatusCode::FORBIDDEN, err.user_message()),
        AdmissionError::PersistenceUnavailable | AdmissionError::RateLimitStoreUnavailable => {
            message(StatusCode::SERVICE_UNAVAILABLE, err.user_message())
        }
        AdmissionError::LookupFailed => {
            message(StatusCode::INTERNAL_SERVER_ERROR, err.user_message())
        }
    }
}

fn directory_response(err: &DirectoryError) -> Response {
    match err {
        DirectoryError::NotFound(_) => message(StatusCode::NOT_FOUND, "Caller not found."),
        DirectoryError::NotSelected(_) => message(
            StatusCode::CONFLICT,
            "Caller has not been selected in a draw.",
        ),
        DirectoryError::PersistenceUnavailable(_) | DirectoryError::ConcurrentModification => {
            message(StatusCode::SERVICE_UNAVAILABLE, GENERIC_FAILURE)
        }
        DirectoryError::Storage(_) => message(StatusCode::INTERNAL_SERVER_ERROR, GENERIC_FAILURE),
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            Self::Admission(e) => admission_response(e),
            Self::Directory(e) => {
                if matches!(
                    e,
                    DirectoryError::Storage(_) | DirectoryError::PersistenceUnavailable(_)
                ) {
                    tracing::error!(error = %e, "Directory request failed");
                }
                directory_response(e)
            }
            Self::Draw(DrawError::NoEligibleCallers) => {
                message(StatusCode::NOT_FOUND, "No eligible callers.")
            }
            Self::Draw(DrawError::Directory(e)) => {
                tracing::error!(error = %e, "Draw failed");
                directory_response(e)
            }
            Self::MalformedBody(detail) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                Json(json!({ "message": "The given data was invalid.", "errors": [
                    { "field": "body", "message": detail }
                ] })),
            )
                .into_response(),
        }
    }
}
