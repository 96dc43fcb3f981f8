use std::{
    collections::HashMap,
    path::PathBuf,
    time::{Duration, Instant},
};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::index::VectorIndex;
use crate::error::AppError;

pub const INDEX_FILE_NAME: &str = "index.json";

/// Key-value store for per-session vector indexes. The store is the only
/// component that creates, replaces, or deletes persisted indexes.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Persists `index` under `session_id`, replacing any previous index
    /// wholesale.
    async fn put(&self, session_id: &str, index: &VectorIndex) -> Result<(), AppError>;

    /// Loads the index for `session_id`, or `AppError::NotFound` when the
    /// session has never uploaded a document.
    async fn get(&self, session_id: &str) -> Result<VectorIndex, AppError>;

    async fn contains(&self, session_id: &str) -> Result<bool, AppError>;

    async fn remove(&self, session_id: &str) -> Result<(), AppError>;

    /// Deletes indexes older than `max_age` and returns how many were removed.
    async fn evict_older_than(&self, max_age: Duration) -> Result<usize, AppError>;
}

/// Filesystem store: one directory per session id under `root`, with the
/// serialized index at `<root>/<session>/index.json`.
pub struct FsIndexStore {
    root: PathBuf,
}

impl FsIndexStore {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, AppError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    fn session_dir(&self, session_id: &str) -> Result<PathBuf, AppError> {
        validate_session_id(session_id)?;
        Ok(self.root.join(session_id))
    }
}

// Session ids become path components, so reject anything beyond the uuid
// alphabet before touching the filesystem.
fn validate_session_id(session_id: &str) -> Result<(), AppError> {
    let valid = !session_id.is_empty()
        && session_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AppError::Validation("invalid session identifier".into()))
    }
}

#[async_trait]
impl IndexStore for FsIndexStore {
    async fn put(&self, session_id: &str, index: &VectorIndex) -> Result<(), AppError> {
        let dir = self.session_dir(session_id)?;

        // Full replacement, not merge
        if tokio::fs::try_exists(&dir).await? {
            tokio::fs::remove_dir_all(&dir).await?;
        }
        tokio::fs::create_dir_all(&dir).await?;

        let serialized = serde_json::to_vec(index)?;
        tokio::fs::write(dir.join(INDEX_FILE_NAME), serialized).await?;
        debug!(%session_id, chunks = index.len(), "persisted session index");
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<VectorIndex, AppError> {
        let path = self.session_dir(session_id)?.join(INDEX_FILE_NAME);
        let raw = match tokio::fs::read(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::NotFound(format!(
                    "no index for session {session_id}"
                )));
            }
            Err(err) => return Err(err.into()),
        };
        Ok(serde_json::from_slice(&raw)?)
    }

    async fn contains(&self, session_id: &str) -> Result<bool, AppError> {
        let path = self.session_dir(session_id)?.join(INDEX_FILE_NAME);
        Ok(tokio::fs::try_exists(&path).await?)
    }

    async fn remove(&self, session_id: &str) -> Result<(), AppError> {
        let dir = self.session_dir(session_id)?;
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    async fn evict_older_than(&self, max_age: Duration) -> Result<usize, AppError> {
        let mut removed = 0;
        let mut entries = tokio::fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if !path.is_dir() {
                continue;
            }

            let age = match entry.metadata().await.and_then(|m| m.modified()) {
                Ok(modified) => modified.elapsed().unwrap_or_default(),
                Err(err) => {
                    warn!(?path, error = %err, "skipping unreadable index directory");
                    continue;
                }
            };

            if age > max_age {
                match tokio::fs::remove_dir_all(&path).await {
                    Ok(()) => removed += 1,
                    Err(err) => warn!(?path, error = %err, "failed to evict stale index"),
                }
            }
        }

        Ok(removed)
    }
}

/// In-memory store used by tests and embeddable deployments.
#[derive(Default)]
pub struct MemoryIndexStore {
    entries: RwLock<HashMap<String, (Instant, VectorIndex)>>,
}

impl MemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IndexStore for MemoryIndexStore {
    async fn put(&self, session_id: &str, index: &VectorIndex) -> Result<(), AppError> {
        validate_session_id(session_id)?;
        self.entries
            .write()
            .await
            .insert(session_id.to_string(), (Instant::now(), index.clone()));
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<VectorIndex, AppError> {
        validate_session_id(session_id)?;
        self.entries
            .read()
            .await
            .get(session_id)
            .map(|(_, index)| index.clone())
            .ok_or_else(|| AppError::NotFound(format!("no index for session {session_id}")))
    }

    async fn contains(&self, session_id: &str) -> Result<bool, AppError> {
        validate_session_id(session_id)?;
        Ok(self.entries.read().await.contains_key(session_id))
    }

    async fn remove(&self, session_id: &str) -> Result<(), AppError> {
        validate_session_id(session_id)?;
        self.entries.write().await.remove(session_id);
        Ok(())
    }

    async fn evict_older_than(&self, max_age: Duration) -> Result<usize, AppError> {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, (created, _)| created.elapsed() <= max_age);
        Ok(before - entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn sample_index(marker: &str) -> VectorIndex {
        VectorIndex::new(
            "hashed",
            2,
            vec![(marker.to_string(), vec![1.0, 0.0])],
        )
    }

    #[tokio::test]
    async fn fs_store_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsIndexStore::new(dir.path()).await.expect("store");
        let session = Uuid::new_v4().to_string();

        assert!(!store.contains(&session).await.expect("contains"));
        store
            .put(&session, &sample_index("hello"))
            .await
            .expect("put");
        assert!(store.contains(&session).await.expect("contains"));

        let loaded = store.get(&session).await.expect("get");
        assert_eq!(loaded.chunks[0].text, "hello");
    }

    #[tokio::test]
    async fn fs_store_put_replaces_wholesale() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsIndexStore::new(dir.path()).await.expect("store");
        let session = Uuid::new_v4().to_string();

        store
            .put(&session, &sample_index("old document"))
            .await
            .expect("put");
        store
            .put(&session, &sample_index("new document"))
            .await
            .expect("put");

        let loaded = store.get(&session).await.expect("get");
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded.chunks[0].text, "new document");
    }

    #[tokio::test]
    async fn fs_store_missing_session_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsIndexStore::new(dir.path()).await.expect("store");

        let err = store
            .get(&Uuid::new_v4().to_string())
            .await
            .expect_err("expected missing index");
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn fs_store_remove_is_idempotent() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsIndexStore::new(dir.path()).await.expect("store");
        let session = Uuid::new_v4().to_string();

        store.put(&session, &sample_index("x")).await.expect("put");
        store.remove(&session).await.expect("remove");
        store.remove(&session).await.expect("second remove");
        assert!(!store.contains(&session).await.expect("contains"));
    }

    #[tokio::test]
    async fn fs_store_rejects_path_like_session_ids() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsIndexStore::new(dir.path()).await.expect("store");

        for bad in ["../escape", "a/b", "", "dot.dot"] {
            let err = store
                .put(bad, &sample_index("x"))
                .await
                .expect_err("expected rejection");
            assert!(matches!(err, AppError::Validation(_)), "id: {bad}");
        }
    }

    #[tokio::test]
    async fn fs_store_eviction_honours_cutoff() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = FsIndexStore::new(dir.path()).await.expect("store");
        let session = Uuid::new_v4().to_string();
        store.put(&session, &sample_index("x")).await.expect("put");

        let kept = store
            .evict_older_than(Duration::from_secs(3600))
            .await
            .expect("evict");
        assert_eq!(kept, 0);
        assert!(store.contains(&session).await.expect("contains"));

        let removed = store
            .evict_older_than(Duration::ZERO)
            .await
            .expect("evict");
        assert_eq!(removed, 1);
        assert!(!store.contains(&session).await.expect("contains"));
    }

    #[tokio::test]
    async fn memory_store_round_trip_and_eviction() {
        let store = MemoryIndexStore::new();
        let session = Uuid::new_v4().to_string();

        store.put(&session, &sample_index("mem")).await.expect("put");
        assert_eq!(
            store.get(&session).await.expect("get").chunks[0].text,
            "mem"
        );

        let removed = store
            .evict_older_than(Duration::ZERO)
            .await
            .expect("evict");
        assert_eq!(removed, 1);
        assert!(matches!(
            store.get(&session).await,
            Err(AppError::NotFound(_))
        ));
    }
}
