//! Wire shape of `/progress` responses.

use serde::{Deserialize, Serialize};

use super::PublicState;
use crate::queue::TaskSnapshot;

/// Progress snapshot sent to polling clients.
///
/// Pending and unknown jobs serialize to `{}` so the two are
/// indistinguishable to clients.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressReport {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<PublicState>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ProgressReport {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Option<&TaskSnapshot>) -> Self {
        let Some(snapshot) = snapshot else {
            return Self::empty();
        };

        match PublicState::from(snapshot.state) {
            PublicState::Pending => Self::empty(),
            PublicState::Progress => Self {
                state: Some(PublicState::Progress),
                progress: Some(0),
                error: None,
            },
            PublicState::Success => Self {
                state: Some(PublicState::Success),
                progress: Some(1),
                error: None,
            },
            PublicState::Failure => Self {
                state: Some(PublicState::Failure),
                progress: Some(0),
                error: Some(
                    snapshot
                        .last_error
                        .clone()
                        .unwrap_or_else(|| "job failed".to_string()),
                ),
            },
        }
    }

    pub fn is_complete(&self) -> bool {
        self.progress == Some(1)
    }

    pub fn is_failed(&self) -> bool {
        self.state == Some(PublicState::Failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{JobId, TaskType};
    use crate::queue::TaskState;
    use serde_json::json;
    use ulid::Ulid;

    fn snapshot(state: TaskState, last_error: Option<&str>) -> TaskSnapshot {
        TaskSnapshot {
            job_id: JobId::from_ulid(Ulid::new()),
            task_type: TaskType::new("test.noop.run.v1"),
            state,
            attempts: 1,
            max_attempts: 1,
            last_error: last_error.map(str::to_string),
            outcome: None,
        }
    }

    #[test]
    fn unknown_job_is_empty_object() {
        let v = serde_json::to_value(ProgressReport::from_snapshot(None)).unwrap();
        assert_eq!(v, json!({}));
    }

    #[test]
    fn queued_job_is_empty_object() {
        let snap = snapshot(TaskState::Queued, None);
        let v = serde_json::to_value(ProgressReport::from_snapshot(Some(&snap))).unwrap();
        assert_eq!(v, json!({}));
    }

    #[test]
    fn running_job_reports_progress_zero() {
        let snap = snapshot(TaskState::Running, None);
        let v = serde_json::to_value(ProgressReport::from_snapshot(Some(&snap))).unwrap();
        assert_eq!(v, json!({"state": "PROGRESS", "progress": 0}));
    }

    #[test]
    fn finished_job_reports_progress_one() {
        let snap = snapshot(TaskState::Succeeded, None);
        let report = ProgressReport::from_snapshot(Some(&snap));
        assert!(report.is_complete());
        assert_eq!(
            serde_json::to_value(report).unwrap(),
            json!({"state": "SUCCESS", "progress": 1})
        );
    }

    #[test]
    fn dead_job_carries_error() {
        let snap = snapshot(TaskState::Dead, Some("render failed"));
        let report = ProgressReport::from_snapshot(Some(&snap));
        assert!(report.is_failed());
        assert_eq!(
            serde_json::to_value(report).unwrap(),
            json!({"state": "FAILURE", "progress": 0, "error": "render failed"})
        );
    }
}
