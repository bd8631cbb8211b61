use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::JobId;
use crate::error::ChartjobError;

/// Task type string.
///
/// Naming convention: `{namespace}.{domain}.{action}.v{major}`,
/// e.g. `chartjob.chart.render.v1`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskType(String);

impl TaskType {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for TaskType {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Job id + task type + JSON payload, as carried through the queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    job_id: JobId,
    task_type: TaskType,
    payload: serde_json::Value,
}

impl TaskEnvelope {
    pub fn new(job_id: JobId, task_type: TaskType, payload: serde_json::Value) -> Self {
        Self {
            job_id,
            task_type,
            payload,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }

    pub fn task_type(&self) -> &TaskType {
        &self.task_type
    }

    pub fn payload(&self) -> &serde_json::Value {
        &self.payload
    }

    /// Decode the payload into a typed task.
    pub fn decode<T: Task>(&self) -> Result<T, ChartjobError> {
        serde_json::from_value(self.payload.clone()).map_err(|source| {
            ChartjobError::InvalidPayload {
                task_type: self.task_type.clone(),
                source,
            }
        })
    }
}

/// Binds a payload type to its task type string.
///
/// ```ignore
/// #[derive(Serialize, Deserialize)]
/// struct ResizeTask { width: u32 }
///
/// impl Task for ResizeTask {
///     const TYPE: &'static str = "acme.image.resize.v1";
/// }
/// ```
pub trait Task: Serialize + DeserializeOwned + Send + Sync + 'static {
    const TYPE: &'static str;

    fn task_type() -> TaskType {
        TaskType::new(Self::TYPE)
    }
}
