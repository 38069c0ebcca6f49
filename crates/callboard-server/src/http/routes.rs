use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use tracing::{info, instrument};

use crate::admission::{RawSubmission, SubmissionResult};
use crate::eligibility::EligibleCaller;
use crate::storage::QuickStats;

use super::{ApiError, AppState, ClientOrigin};

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}

/// `POST /api/callers` - 201 when a caller was created, 200 when an existing
/// one was counted again.
#[instrument(skip_all, fields(origin = %origin.0))]
pub async fn submit_caller(
    State(state): State<AppState>,
    origin: ClientOrigin,
    body: Result<Json<RawSubmission>, JsonRejection>,
) -> Result<(StatusCode, Json<SubmissionResult>), ApiError> {
    let Json(raw) = body.map_err(|e| ApiError::MalformedBody(e.body_text()))?;
    let result = state.pipeline.submit_raw(raw, origin.0).await?;

    let status = if result.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };
    Ok((status, Json(result)))
}

/// `GET /api/stats`
pub async fn stats(State(state): State<AppState>) -> Result<Json<QuickStats>, ApiError> {
    Ok(Json(state.directory.quick_stats().await?))
}

/// `GET /admin/eligible`
pub async fn eligible(
    State(state): State<AppState>,
) -> Result<Json<Vec<EligibleCaller>>, ApiError> {
    Ok(Json(state.draw.view().eligible_for_draw().await?))
}

/// `POST /admin/draw`
pub async fn draw(State(state): State<AppState>) -> Result<Json<EligibleCaller>, ApiError> {
    Ok(Json(state.draw.pick().await?))
}

/// `POST /admin/callers/{id}/winner`
#[instrument(skip_all, fields(caller_id = %id))]
pub async fn confirm_winner(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<EligibleCaller>, ApiError> {
    let caller = state.directory.confirm_winner(&id).await?;
    info!(caller_id = %caller.id, "Winner confirmed");
    Ok(Json(EligibleCaller::from(caller)))
}
