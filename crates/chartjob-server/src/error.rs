use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use chartjob_core::ChartjobError;
use chartjob_core::ports::ArtifactError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Implements [`IntoResponse`] to produce `{"error": ..., "code": ...}` JSON bodies.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] ChartjobError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("missing jobid query parameter")]
    MissingJobId,

    #[error("job {0} not found")]
    JobNotFound(String),

    #[error("job {job_id} failed: {reason}")]
    JobFailed { job_id: String, reason: String },

    #[error("job {0} did not finish in time")]
    ResultTimeout(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Core(core) => match core {
                ChartjobError::JobNotFound(id) => (
                    StatusCode::NOT_FOUND,
                    "JOB_NOT_FOUND",
                    format!("job {id} not found"),
                ),
                ChartjobError::InvalidTask(msg) => {
                    (StatusCode::BAD_REQUEST, "INVALID_TASK", msg.clone())
                }
                ChartjobError::Artifact(artifact) => artifact_parts(artifact),
                other => internal(other),
            },
            AppError::Artifact(artifact) => artifact_parts(artifact),
            AppError::MissingJobId => (
                StatusCode::NOT_FOUND,
                "MISSING_JOB_ID",
                self.to_string(),
            ),
            AppError::JobNotFound(_) => (StatusCode::NOT_FOUND, "JOB_NOT_FOUND", self.to_string()),
            AppError::JobFailed { .. } => (StatusCode::CONFLICT, "JOB_FAILED", self.to_string()),
            AppError::ResultTimeout(_) => (
                StatusCode::GATEWAY_TIMEOUT,
                "RESULT_TIMEOUT",
                self.to_string(),
            ),
            AppError::InternalError(msg) => internal(msg),
        }
    }
}

fn artifact_parts(err: &ArtifactError) -> (StatusCode, &'static str, String) {
    match err {
        ArtifactError::NotFound(_) => (
            StatusCode::NOT_FOUND,
            "ARTIFACT_NOT_FOUND",
            "result is no longer available".to_string(),
        ),
        ArtifactError::AlreadyConsumed(_) => (
            StatusCode::GONE,
            "ALREADY_CONSUMED",
            "result was already retrieved".to_string(),
        ),
        ArtifactError::Expired(_) => (
            StatusCode::GONE,
            "EXPIRED",
            "result expired before it was retrieved".to_string(),
        ),
        other => internal(other),
    }
}

fn internal(err: &dyn std::fmt::Display) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %err, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}
