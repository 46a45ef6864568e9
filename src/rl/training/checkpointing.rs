//! Model Checkpointing
//!
//! Byte-level snapshot storage keyed by model id.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::error::{A3cError, Result};

/// Opaque snapshot storage
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ModelStore: Send + Sync {
    /// Store `bytes` under `id`. With `overwrite == false` an existing
    /// snapshot is an error.
    async fn write(&self, id: &str, bytes: Vec<u8>, overwrite: bool) -> Result<()>;

    /// Snapshot bytes for `id`, `None` when nothing was ever written
    async fn restore(&self, id: &str) -> Result<Option<Vec<u8>>>;
}

/// Validate a model id for use as a single path component
pub fn validate_model_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id != "."
        && id != ".."
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(A3cError::InvalidModelId(id.to_string()))
    }
}

/// Snapshots as files at `<model_folder>/<id>`.
///
/// Each write goes to its own hidden sibling file which is synced and then
/// renamed over the target, so the previous snapshot stays intact until the
/// new one is complete. Concurrent writes of one id never share a temp file.
#[derive(Debug, Clone)]
pub struct FileModelStore {
    model_folder: PathBuf,
}

impl FileModelStore {
    pub fn new<P: AsRef<Path>>(model_folder: P) -> Self {
        Self {
            model_folder: model_folder.as_ref().to_path_buf(),
        }
    }

    pub fn model_folder(&self) -> &Path {
        &self.model_folder
    }

    /// Snapshot path for a model id
    pub fn model_path(&self, id: &str) -> Result<PathBuf> {
        validate_model_id(id)?;
        Ok(self.model_folder.join(id))
    }

    fn temp_path(&self, id: &str) -> PathBuf {
        static NEXT_TEMP: AtomicU64 = AtomicU64::new(0);
        let n = NEXT_TEMP.fetch_add(1, Ordering::Relaxed);
        self.model_folder
            .join(format!(".{}.{}.{}.tmp", id, std::process::id(), n))
    }

    async fn remove_temp(path: &Path) {
        if let Err(e) = fs::remove_file(path).await {
            warn!("Failed to remove partial snapshot {:?}: {}", path, e);
        }
    }

    #[cfg(unix)]
    async fn sync_folder(&self) -> Result<()> {
        fs::File::open(&self.model_folder).await?.sync_all().await?;
        Ok(())
    }

    #[cfg(not(unix))]
    async fn sync_folder(&self) -> Result<()> {
        Ok(())
    }

    async fn write_temp(path: &Path, bytes: &[u8]) -> Result<()> {
        let mut file = fs::File::create(path).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        Ok(())
    }
}

#[async_trait]
impl ModelStore for FileModelStore {
    async fn write(&self, id: &str, bytes: Vec<u8>, overwrite: bool) -> Result<()> {
        let path = self.model_path(id)?;
        fs::create_dir_all(&self.model_folder).await?;

        if !overwrite && fs::try_exists(&path).await? {
            return Err(A3cError::ModelExists(path.display().to_string()));
        }

        let temp = self.temp_path(id);
        if let Err(e) = Self::write_temp(&temp, &bytes).await {
            Self::remove_temp(&temp).await;
            return Err(e);
        }
        if let Err(e) = fs::rename(&temp, &path).await {
            Self::remove_temp(&temp).await;
            return Err(e.into());
        }
        self.sync_folder().await?;

        info!(model_id = id, bytes = bytes.len(), "Saved model snapshot to {:?}", path);
        Ok(())
    }

    async fn restore(&self, id: &str) -> Result<Option<Vec<u8>>> {
        let path = self.model_path(id)?;
        match fs::read(&path).await {
            Ok(bytes) => {
                debug!(model_id = id, bytes = bytes.len(), "Read model snapshot {:?}", path);
                Ok(Some(bytes))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env::temp_dir;

    fn scratch_store() -> FileModelStore {
        FileModelStore::new(temp_dir().join(format!("a3c-store-{}", uuid::Uuid::new_v4())))
    }

    #[tokio::test]
    async fn test_write_then_restore() {
        let store = scratch_store();
        store.write("btc-a3c", vec![1, 2, 3], false).await.unwrap();

        assert_eq!(store.restore("btc-a3c").await.unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(store.restore("eth-a3c").await.unwrap(), None);

        let _ = std::fs::remove_dir_all(store.model_folder());
    }

    #[tokio::test]
    async fn test_overwrite_flag() {
        let store = scratch_store();
        store.write("m", vec![1], false).await.unwrap();

        let result = store.write("m", vec![2], false).await;
        assert!(matches!(result, Err(A3cError::ModelExists(_))));
        assert_eq!(store.restore("m").await.unwrap(), Some(vec![1]));

        store.write("m", vec![2], true).await.unwrap();
        assert_eq!(store.restore("m").await.unwrap(), Some(vec![2]));

        // no temporary files left behind
        let entries = std::fs::read_dir(store.model_folder()).unwrap().count();
        assert_eq!(entries, 1);

        let _ = std::fs::remove_dir_all(store.model_folder());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writes_leave_one_whole_snapshot() {
        let store = scratch_store();
        let large = vec![1u8; 4 << 20];
        let small = vec![2u8; 2 << 20];

        for _ in 0..8 {
            let (a, b) = tokio::join!(
                store.write("m", large.clone(), true),
                store.write("m", small.clone(), true)
            );
            a.unwrap();
            b.unwrap();

            let stored = store.restore("m").await.unwrap().unwrap();
            assert!(stored == large || stored == small, "torn snapshot");
        }

        let entries = std::fs::read_dir(store.model_folder()).unwrap().count();
        assert_eq!(entries, 1);

        let _ = std::fs::remove_dir_all(store.model_folder());
    }

    #[test]
    fn test_temp_paths_are_unique_hidden_siblings() {
        let store = scratch_store();
        let first = store.temp_path("m");
        let second = store.temp_path("m");

        assert_ne!(first, second);
        assert_eq!(first.parent(), Some(store.model_folder()));
        assert!(first
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with(".m.")));
    }

    #[test]
    fn test_model_ids_are_single_path_components() {
        assert!(validate_model_id("btc-usd_a3c.v2").is_ok());
        for bad in ["", ".", "..", "../etc", "a/b", "a\\b", ".hidden"] {
            assert!(
                matches!(validate_model_id(bad), Err(A3cError::InvalidModelId(_))),
                "{bad:?} should be rejected"
            );
        }
    }
}
