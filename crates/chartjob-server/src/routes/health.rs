use axum::extract::State;
use axum::{Json, Router, routing::get};
use chartjob_core::app::QueueCounts;
use serde::Serialize;

use crate::state::AppState;

/// Health check response payload.
#[derive(Serialize)]
pub struct HealthResponse {
    /// Overall service status.
    pub status: &'static str,
    /// Crate version from Cargo.toml.
    pub version: &'static str,
    /// Jobs per queue state; absent when the queue could not be read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub queue: Option<QueueCounts>,
}

/// GET /health -- returns service and queue health.
async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let queue = match state.queue.counts_by_state().await {
        Ok(counts) => Some(counts),
        Err(e) => {
            tracing::warn!(error = %e, "queue counts unavailable");
            None
        }
    };

    let status = if queue.is_some() { "ok" } else { "degraded" };

    Json(HealthResponse {
        status,
        version: env!("CARGO_PKG_VERSION"),
        queue,
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
