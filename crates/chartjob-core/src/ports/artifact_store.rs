//! ArtifactStore port: short-lived binary results.
//!
//! Artifacts are written once by a task handler and read at most once by a
//! client. Every artifact carries a TTL; expired artifacts are unreadable and
//! are reclaimed by `purge_expired`, which the GC loop calls periodically.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::ArtifactHandle;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact not found: {0}")]
    NotFound(String),

    #[error("artifact already consumed: {0}")]
    AlreadyConsumed(String),

    #[error("artifact expired: {0}")]
    Expired(String),

    #[error("invalid ttl: {0:?}")]
    InvalidTtl(Duration),

    #[error("artifact io error ({name}): {source}")]
    Io {
        name: String,
        #[source]
        source: std::io::Error,
    },
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Store `bytes` under a fresh unique name.
    async fn put(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        ttl: Duration,
    ) -> Result<ArtifactHandle, ArtifactError>;

    /// Read and delete. Succeeds at most once per artifact.
    async fn take(&self, handle: &ArtifactHandle) -> Result<Vec<u8>, ArtifactError>;

    /// Remove expired artifacts and forget old tombstones; returns how many
    /// entries changed.
    async fn purge_expired(&self) -> Result<usize, ArtifactError>;
}
