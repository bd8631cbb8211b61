//! Filesystem-backed ArtifactStore.
//!
//! Each artifact is a file `<root>/<token>.png`, where `token` is 20 random
//! `[a-z0-9]` characters. An in-memory index tracks expiry and whether the
//! artifact has been consumed. Consumed and expired entries lose their file
//! but stay in the index as tombstones for a grace period past the TTL, so a
//! late `take` reports `AlreadyConsumed` or `Expired` rather than `NotFound`.
//!
//! The index is the authority. A `take` claims its entry under the index lock
//! before touching the file, so concurrent takes of the same artifact cannot
//! both succeed.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::ArtifactHandle;
use crate::ports::{ArtifactError, ArtifactStore, Clock};

const TOKEN_LEN: usize = 20;
const TOKEN_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const EXTENSION: &str = "png";
const DEFAULT_TOMBSTONE_GRACE: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntryState {
    Live,
    Consumed,
    Expired,
}

#[derive(Debug, Clone, Copy)]
struct IndexEntry {
    expires_at: DateTime<Utc>,
    state: EntryState,
}

pub struct FsArtifactStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
    tombstone_grace: Duration,
    index: Mutex<HashMap<String, IndexEntry>>,
}

impl FsArtifactStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// The index is not persisted, so artifact files left behind by a previous
    /// process are unreachable; they are removed here.
    pub async fn open(
        root: impl Into<PathBuf>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ArtifactError> {
        let root = root.into();
        let root_name = root.display().to_string();

        tokio::fs::create_dir_all(&root)
            .await
            .map_err(|source| ArtifactError::Io {
                name: root_name.clone(),
                source,
            })?;

        let mut entries = tokio::fs::read_dir(&root)
            .await
            .map_err(|source| ArtifactError::Io {
                name: root_name.clone(),
                source,
            })?;

        let mut removed = 0usize;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|source| ArtifactError::Io {
                name: root_name.clone(),
                source,
            })?
        {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !is_artifact_name(name) {
                continue;
            }
            match tokio::fs::remove_file(entry.path()).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(artifact = name, error = %e, "failed to remove stale artifact"),
            }
        }
        if removed > 0 {
            debug!(removed, root = %root.display(), "removed stale artifacts");
        }

        Ok(Self {
            root,
            clock,
            tombstone_grace: DEFAULT_TOMBSTONE_GRACE,
            index: Mutex::new(HashMap::new()),
        })
    }

    /// How long consumed and expired entries are remembered after their TTL.
    pub fn with_tombstone_grace(mut self, tombstone_grace: Duration) -> Self {
        self.tombstone_grace = tombstone_grace;
        self
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Number of entries in the index, tombstones included.
    pub async fn len(&self) -> usize {
        self.index.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.index.lock().await.is_empty()
    }
}

fn random_name() -> String {
    let mut rng = rand::thread_rng();
    let token: String = (0..TOKEN_LEN)
        .map(|_| TOKEN_CHARSET[rng.gen_range(0..TOKEN_CHARSET.len())] as char)
        .collect();
    format!("{token}.{EXTENSION}")
}

/// `[a-z0-9]{20}.png`
pub fn is_artifact_name(name: &str) -> bool {
    let Some(token) = name
        .strip_suffix(EXTENSION)
        .and_then(|rest| rest.strip_suffix('.'))
    else {
        return false;
    };
    token.len() == TOKEN_LEN
        && token
            .bytes()
            .all(|b| b.is_ascii_lowercase() || b.is_ascii_digit())
}

async fn remove_quietly(path: &Path) -> Result<(), std::io::Error> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn put(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        ttl: Duration,
    ) -> Result<ArtifactHandle, ArtifactError> {
        if ttl.is_zero() {
            return Err(ArtifactError::InvalidTtl(ttl));
        }
        let ttl_chrono = chrono::Duration::from_std(ttl).map_err(|_| ArtifactError::InvalidTtl(ttl))?;
        let expires_at = self.clock.now() + ttl_chrono;

        // Reserve a name no live entry is using.
        let name = {
            let mut index = self.index.lock().await;
            let mut name = random_name();
            while index.contains_key(&name) {
                name = random_name();
            }
            index.insert(
                name.clone(),
                IndexEntry {
                    expires_at,
                    state: EntryState::Live,
                },
            );
            name
        };

        let size = bytes.len() as u64;
        if let Err(source) = tokio::fs::write(self.path_for(&name), bytes).await {
            self.index.lock().await.remove(&name);
            return Err(ArtifactError::Io { name, source });
        }

        debug!(artifact = %name, size, %expires_at, "stored artifact");
        Ok(ArtifactHandle {
            name,
            content_type: content_type.to_string(),
            size,
            expires_at,
        })
    }

    async fn take(&self, handle: &ArtifactHandle) -> Result<Vec<u8>, ArtifactError> {
        let name = handle.name.as_str();
        let now = self.clock.now();

        let expired = {
            let mut index = self.index.lock().await;
            let entry = index
                .get_mut(name)
                .ok_or_else(|| ArtifactError::NotFound(name.to_string()))?;
            match entry.state {
                EntryState::Consumed => {
                    return Err(ArtifactError::AlreadyConsumed(name.to_string()));
                }
                EntryState::Expired => return Err(ArtifactError::Expired(name.to_string())),
                EntryState::Live if now >= entry.expires_at => {
                    entry.state = EntryState::Expired;
                    true
                }
                EntryState::Live => {
                    entry.state = EntryState::Consumed;
                    false
                }
            }
        };

        let path = self.path_for(name);
        if expired {
            if let Err(e) = remove_quietly(&path).await {
                warn!(artifact = name, error = %e, "failed to remove expired artifact");
            }
            return Err(ArtifactError::Expired(name.to_string()));
        }

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound(name.to_string()));
            }
            Err(source) => {
                // Nothing was delivered; release the claim so the client can retry.
                if let Some(entry) = self.index.lock().await.get_mut(name) {
                    entry.state = EntryState::Live;
                }
                warn!(artifact = name, error = %source, "failed to read artifact");
                return Err(ArtifactError::Io {
                    name: name.to_string(),
                    source,
                });
            }
        };

        if let Err(e) = remove_quietly(&path).await {
            warn!(artifact = name, error = %e, "failed to remove consumed artifact");
        }
        debug!(artifact = name, size = bytes.len(), "artifact consumed");
        Ok(bytes)
    }

    async fn purge_expired(&self) -> Result<usize, ArtifactError> {
        let now = self.clock.now();
        let grace = chrono::Duration::from_std(self.tombstone_grace).ok();

        let (to_remove, dropped) = {
            let mut index = self.index.lock().await;
            let mut to_remove = Vec::new();
            let mut dropped = 0usize;
            index.retain(|name, entry| {
                if now < entry.expires_at {
                    return true;
                }
                if entry.state == EntryState::Live {
                    entry.state = EntryState::Expired;
                    to_remove.push(name.clone());
                    return true;
                }
                let keep = grace
                    .and_then(|g| entry.expires_at.checked_add_signed(g))
                    .is_none_or(|forget_at| now < forget_at);
                if !keep {
                    dropped += 1;
                }
                keep
            });
            (to_remove, dropped)
        };

        for name in &to_remove {
            if let Err(e) = remove_quietly(&self.path_for(name)).await {
                warn!(artifact = %name, error = %e, "failed to purge artifact");
            }
        }

        let purged = to_remove.len() + dropped;
        if purged > 0 {
            debug!(expired = to_remove.len(), tombstones = dropped, "purged expired artifacts");
        }
        Ok(purged)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::FixedClock;
    use chrono::TimeZone;
    use std::collections::HashSet;

    const TTL: Duration = Duration::from_secs(600);

    fn clock() -> Arc<FixedClock> {
        Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ))
    }

    async fn store(dir: &Path, clock: Arc<FixedClock>) -> FsArtifactStore {
        FsArtifactStore::open(dir, clock).await.unwrap()
    }

    #[test]
    fn random_names_match_pattern() {
        for _ in 0..100 {
            let name = random_name();
            assert!(is_artifact_name(&name), "bad name {name}");
        }
    }

    #[test]
    fn artifact_name_rejects_other_files() {
        assert!(!is_artifact_name("notes.txt"));
        assert!(!is_artifact_name("ABCDEFGHIJ0123456789.png"));
        assert!(!is_artifact_name("abc.png"));
        assert!(!is_artifact_name("abcdefghij0123456789png"));
    }

    #[tokio::test]
    async fn put_then_take_returns_bytes_and_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), clock()).await;

        let handle = store.put(vec![1, 2, 3], "image/png", TTL).await.unwrap();
        assert!(is_artifact_name(&handle.name));
        assert_eq!(handle.size, 3);
        assert_eq!(handle.content_type, "image/png");
        assert!(dir.path().join(&handle.name).exists());

        let bytes = store.take(&handle).await.unwrap();
        assert_eq!(bytes, vec![1, 2, 3]);
        assert!(!dir.path().join(&handle.name).exists());
    }

    #[tokio::test]
    async fn second_take_reports_already_consumed() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), clock()).await;

        let handle = store.put(vec![9], "image/png", TTL).await.unwrap();
        store.take(&handle).await.unwrap();

        let err = store.take(&handle).await.unwrap_err();
        assert!(matches!(err, ArtifactError::AlreadyConsumed(_)));
    }

    #[tokio::test]
    async fn concurrent_takes_succeed_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(store(dir.path(), clock()).await);
        let handle = store.put(vec![7; 64], "image/png", TTL).await.unwrap();

        let mut joins = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            let handle = handle.clone();
            joins.push(tokio::spawn(async move { store.take(&handle).await }));
        }

        let mut ok = 0;
        for j in joins {
            if j.await.unwrap().is_ok() {
                ok += 1;
            }
        }
        assert_eq!(ok, 1);
    }

    #[tokio::test]
    async fn expired_artifact_cannot_be_taken() {
        let dir = tempfile::tempdir().unwrap();
        let clock = clock();
        let store = store(dir.path(), clock.clone()).await;

        let handle = store.put(vec![1], "image/png", TTL).await.unwrap();
        clock.advance(chrono::Duration::seconds(601));

        let err = store.take(&handle).await.unwrap_err();
        assert!(matches!(err, ArtifactError::Expired(_)));
        assert!(!dir.path().join(&handle.name).exists());
    }

    #[tokio::test]
    async fn unknown_handle_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let clock = clock();
        let store = store(dir.path(), clock.clone()).await;

        let handle = ArtifactHandle {
            name: "aaaaaaaaaaaaaaaaaaaa.png".to_string(),
            content_type: "image/png".to_string(),
            size: 0,
            expires_at: clock.now(),
        };
        let err = store.take(&handle).await.unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }

    #[tokio::test]
    async fn zero_ttl_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), clock()).await;

        let err = store.put(vec![1], "image/png", Duration::ZERO).await.unwrap_err();
        assert!(matches!(err, ArtifactError::InvalidTtl(_)));
    }

    #[tokio::test]
    async fn names_are_unique_across_many_puts() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), clock()).await;

        let mut names = HashSet::new();
        for _ in 0..200 {
            let handle = store.put(vec![0], "image/png", TTL).await.unwrap();
            assert!(names.insert(handle.name));
        }
    }

    #[tokio::test]
    async fn purge_keeps_tombstones_through_the_grace_period() {
        let dir = tempfile::tempdir().unwrap();
        let clock = clock();
        let store = store(dir.path(), clock.clone())
            .await
            .with_tombstone_grace(Duration::from_secs(300));

        let unread = store.put(vec![1], "image/png", TTL).await.unwrap();
        let read = store.put(vec![2], "image/png", TTL).await.unwrap();
        store.take(&read).await.unwrap();
        let fresh = store
            .put(vec![3], "image/png", Duration::from_secs(3600))
            .await
            .unwrap();

        clock.advance(chrono::Duration::seconds(601));
        assert_eq!(store.purge_expired().await.unwrap(), 1);
        assert!(!dir.path().join(&unread.name).exists());
        assert!(dir.path().join(&fresh.name).exists());
        assert_eq!(store.len().await, 3);

        let err = store.take(&unread).await.unwrap_err();
        assert!(matches!(err, ArtifactError::Expired(_)));
        let err = store.take(&read).await.unwrap_err();
        assert!(matches!(err, ArtifactError::AlreadyConsumed(_)));

        clock.advance(chrono::Duration::seconds(300));
        assert_eq!(store.purge_expired().await.unwrap(), 2);
        assert_eq!(store.len().await, 1);

        let err = store.take(&unread).await.unwrap_err();
        assert!(matches!(err, ArtifactError::NotFound(_)));
    }

    #[tokio::test]
    async fn expired_take_leaves_a_tombstone() {
        let dir = tempfile::tempdir().unwrap();
        let clock = clock();
        let store = store(dir.path(), clock.clone()).await;

        let handle = store.put(vec![1], "image/png", TTL).await.unwrap();
        clock.advance(chrono::Duration::seconds(601));

        for _ in 0..2 {
            let err = store.take(&handle).await.unwrap_err();
            assert!(matches!(err, ArtifactError::Expired(_)));
        }
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn failed_read_releases_the_claim() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path(), clock()).await;

        let handle = store.put(vec![4, 2], "image/png", TTL).await.unwrap();
        let path = dir.path().join(&handle.name);

        // A directory in place of the file makes the read fail.
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();
        let err = store.take(&handle).await.unwrap_err();
        assert!(matches!(err, ArtifactError::Io { .. }));

        std::fs::remove_dir(&path).unwrap();
        std::fs::write(&path, [4, 2]).unwrap();
        assert_eq!(store.take(&handle).await.unwrap(), vec![4, 2]);

        let err = store.take(&handle).await.unwrap_err();
        assert!(matches!(err, ArtifactError::AlreadyConsumed(_)));
    }

    #[tokio::test]
    async fn open_removes_stale_artifacts_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("abcdefghij0123456789.png"), b"old").unwrap();
        std::fs::write(dir.path().join("keep.txt"), b"keep").unwrap();

        let _store = store(dir.path(), clock()).await;

        assert!(!dir.path().join("abcdefghij0123456789.png").exists());
        assert!(dir.path().join("keep.txt").exists());
    }
}
