//! HTTP surface: public submission endpoint, stats, and the admin draw.

mod error;
mod origin;
mod routes;

use axum::Router;
use axum::routing::{get, post};
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::admission::AdmissionPipeline;
use crate::directory::CallerDirectory;
use crate::draw::Draw;

pub use error::ApiError;
pub use origin::ClientOrigin;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: AdmissionPipeline,
    pub directory: CallerDirectory,
    pub draw: Draw,
    /// Take the origin from `X-Forwarded-For` instead of the peer address.
    pub trust_forwarded_for: bool,
}

impl AppState {
    pub fn new(pipeline: AdmissionPipeline, trust_forwarded_for: bool) -> Self {
        let directory = pipeline.directory().clone();
        Self {
            draw: Draw::new(directory.clone()),
            directory,
            pipeline,
            trust_forwarded_for,
        }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(routes::health))
        .route("/api/callers", post(routes::submit_caller))
        .route("/api/stats", get(routes::stats))
        .route("/admin/eligible", get(routes::eligible))
        .route("/admin/draw", post(routes::draw))
        .route("/admin/callers/{id}/winner", post(routes::confirm_winner))
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new())
        .with_state(state)
}
