//! Outcome model: what a handler reports back for one attempt.

use serde::{Deserialize, Serialize};

use super::ArtifactHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OutcomeKind {
    Success,
    Failure,
}

/// Something produced during execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value")]
pub enum Artifact {
    /// Bytes held by an `ArtifactStore`.
    Stored(ArtifactHandle),

    /// Arbitrary JSON result.
    Json(serde_json::Value),
}

/// Result of one attempt.
///
/// A `Failure` outcome is reported to the queue the same way a handler error
/// is, so retry policy applies to both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Outcome {
    pub kind: OutcomeKind,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<Artifact>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Outcome {
    pub fn success() -> Self {
        Self {
            kind: OutcomeKind::Success,
            artifacts: Vec::new(),
            reason: None,
        }
    }

    pub fn failure(reason: impl Into<String>) -> Self {
        Self {
            kind: OutcomeKind::Failure,
            artifacts: Vec::new(),
            reason: Some(reason.into()),
        }
    }

    pub fn with_artifact(mut self, artifact: Artifact) -> Self {
        self.artifacts.push(artifact);
        self
    }

    pub fn is_success(&self) -> bool {
        self.kind == OutcomeKind::Success
    }

    /// First stored artifact, if any.
    pub fn stored_artifact(&self) -> Option<&ArtifactHandle> {
        self.artifacts.iter().find_map(|a| match a {
            Artifact::Stored(handle) => Some(handle),
            Artifact::Json(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn handle() -> ArtifactHandle {
        ArtifactHandle {
            name: "abcdefghij0123456789.png".to_string(),
            content_type: "image/png".to_string(),
            size: 42,
            expires_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 10, 0).unwrap(),
        }
    }

    #[test]
    fn outcome_kind_serializes_as_required_names() {
        let s = serde_json::to_string(&OutcomeKind::Success).unwrap();
        assert_eq!(s, "\"SUCCESS\"");

        let s = serde_json::to_string(&OutcomeKind::Failure).unwrap();
        assert_eq!(s, "\"FAILURE\"");
    }

    #[test]
    fn stored_artifact_skips_json_entries() {
        let o = Outcome::success()
            .with_artifact(Artifact::Json(serde_json::json!({"points": 10})))
            .with_artifact(Artifact::Stored(handle()));

        assert_eq!(o.stored_artifact(), Some(&handle()));
    }

    #[test]
    fn stored_artifact_is_none_without_handles() {
        assert!(Outcome::failure("boom").stored_artifact().is_none());
    }

    #[test]
    fn artifact_is_tagged_enum() {
        let v = serde_json::to_value(Artifact::Stored(handle())).unwrap();
        assert_eq!(v["kind"], "Stored");
        assert_eq!(v["value"]["name"], "abcdefghij0123456789.png");
    }
}
