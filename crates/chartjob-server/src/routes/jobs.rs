use axum::extract::{Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE};
use axum::response::IntoResponse;
use axum::{Json, Router, routing::get};
use chartjob_core::domain::{JobId, ProgressReport};
use chartjob_core::queue::TaskState;
use chartjob_core::ChartjobError;
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct JobQuery {
    pub jobid: Option<String>,
}

/// GET /progress?jobid= -- non-blocking state snapshot.
///
/// Missing, malformed and unknown ids all yield `{}`, the same as a job
/// still waiting in the queue.
async fn progress(
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> Json<ProgressReport> {
    let Some(job_id) = query.jobid.as_deref().and_then(|raw| raw.parse::<JobId>().ok()) else {
        return Json(ProgressReport::empty());
    };

    let snapshot = state.queue.status(job_id).await;
    Json(ProgressReport::from_snapshot(snapshot.as_ref()))
}

/// GET /result.png?jobid= -- wait for the job, then hand out its chart once.
async fn result_png(
    State(state): State<AppState>,
    Query(query): Query<JobQuery>,
) -> AppResult<impl IntoResponse> {
    let raw = query.jobid.ok_or(AppError::MissingJobId)?;
    let job_id: JobId = raw
        .parse()
        .map_err(|_| AppError::JobNotFound(raw.clone()))?;

    let wait = state.config.result_wait_timeout();
    let snapshot = match tokio::time::timeout(wait, state.queue.wait(job_id)).await {
        Ok(Ok(snapshot)) => snapshot,
        Ok(Err(ChartjobError::JobNotFound(_))) => return Err(AppError::JobNotFound(raw)),
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            tracing::warn!(%job_id, ?wait, "result wait timed out");
            return Err(AppError::ResultTimeout(raw));
        }
    };

    if snapshot.state == TaskState::Dead {
        let reason = snapshot
            .last_error
            .unwrap_or_else(|| "job failed".to_string());
        return Err(AppError::JobFailed { job_id: raw, reason });
    }

    let handle = snapshot
        .outcome
        .as_ref()
        .and_then(|outcome| outcome.stored_artifact())
        .cloned()
        .ok_or_else(|| AppError::InternalError(format!("job {job_id} has no stored artifact")))?;

    let bytes = state.store.take(&handle).await?;
    tracing::info!(%job_id, artifact = %handle.name, size = bytes.len(), "result delivered");

    Ok((
        [
            (CONTENT_TYPE, handle.content_type),
            (CACHE_CONTROL, "no-store".to_string()),
        ],
        bytes,
    ))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/progress", get(progress))
        .route("/result.png", get(result_png))
}
