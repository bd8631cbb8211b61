use thiserror::Error;

use crate::chart::RenderError;
use crate::domain::{JobId, TaskType};
use crate::ports::ArtifactError;

#[derive(Debug, Error)]
pub enum ChartjobError {
    #[error("handler not found for task_type={0}")]
    HandlerNotFound(TaskType),

    #[error("job not found: {0}")]
    JobNotFound(JobId),

    #[error("invalid payload for task_type={task_type}: {source}")]
    InvalidPayload {
        task_type: TaskType,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid task: {0}")]
    InvalidTask(String),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error("{0}")]
    Other(String),
}
