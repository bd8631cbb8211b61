//! Client-facing job state.
//!
//! The queue tracks a richer `TaskState`; clients only ever see the four
//! states below.

use serde::{Deserialize, Serialize};

use crate::queue::TaskState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PublicState {
    /// Queued, waiting for a retry, or not known at all.
    Pending,
    Progress,
    Success,
    Failure,
}

impl From<TaskState> for PublicState {
    fn from(state: TaskState) -> Self {
        match state {
            TaskState::Queued | TaskState::RetryScheduled => PublicState::Pending,
            TaskState::Running => PublicState::Progress,
            TaskState::Succeeded => PublicState::Success,
            TaskState::Dead => PublicState::Failure,
        }
    }
}
