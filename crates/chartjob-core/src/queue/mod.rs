//! Queue module: the broker seam, task state, retry logic and the in-memory
//! implementation.

mod memory;
mod record;
mod retry;
mod state;

pub use memory::InMemoryQueue;
pub use record::TaskRecord;
pub use retry::RetryPolicy;
pub use state::TaskState;

use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;

use crate::app::QueueCounts;
use crate::domain::{JobId, Outcome, Task, TaskEnvelope, TaskType};
use crate::error::ChartjobError;

/// Point-in-time copy of a task record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskSnapshot {
    pub job_id: JobId,
    pub task_type: TaskType,
    pub state: TaskState,
    pub attempts: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub outcome: Option<Outcome>,
}

/// A leased task. The worker owns this lease and must either `ack` or `fail`.
///
/// The queue owns state transitions; the worker only reports results.
#[async_trait]
pub trait TaskLease: Send {
    fn envelope(&self) -> &TaskEnvelope;

    fn job_id(&self) -> JobId {
        self.envelope().job_id()
    }

    /// Mark success and record the outcome.
    async fn ack(self: Box<Self>, outcome: Outcome) -> Result<(), ChartjobError>;

    /// Mark failure (queue decides retry/dead).
    async fn fail(self: Box<Self>, error: String) -> Result<(), ChartjobError>;
}

/// Broker port.
#[async_trait]
pub trait Queue: Send + Sync {
    /// Enqueue a new job; the queue assigns its id.
    async fn enqueue(
        &self,
        task_type: TaskType,
        payload: serde_json::Value,
    ) -> Result<JobId, ChartjobError>;

    /// Current snapshot, or `None` if the id is unknown (or already purged).
    async fn status(&self, job_id: JobId) -> Option<TaskSnapshot>;

    /// Wait until the job is terminal and return its final snapshot.
    async fn wait(&self, job_id: JobId) -> Result<TaskSnapshot, ChartjobError>;

    /// Lease one ready task (waits until one is available).
    async fn lease(&self) -> Option<Box<dyn TaskLease>>;

    async fn counts_by_state(&self) -> Result<QueueCounts, ChartjobError>;

    /// Drop terminal records last updated before `older_than`.
    async fn purge_finished(&self, older_than: Instant) -> usize;
}

/// Serialize a typed task and enqueue it under `T::TYPE`.
pub async fn submit<T: Task>(queue: &dyn Queue, task: &T) -> Result<JobId, ChartjobError> {
    let payload =
        serde_json::to_value(task).map_err(|source| ChartjobError::InvalidPayload {
            task_type: T::task_type(),
            source,
        })?;
    queue.enqueue(T::task_type(), payload).await
}
