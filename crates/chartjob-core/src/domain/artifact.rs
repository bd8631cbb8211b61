use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Reference to a stored artifact.
///
/// `name` is the file name inside the store root (`[a-z0-9]{20}.png`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactHandle {
    pub name: String,
    pub content_type: String,
    pub size: u64,
    pub expires_at: DateTime<Utc>,
}
