//! Storage seam for partition artifacts.

use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use adrecon_types::AdreconError;

/// Minimal object-store contract the partition writer needs: list a
/// prefix, delete an object, upload an object. Paths are `/`-separated
/// keys relative to the store root.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Keys under `prefix` (non-recursive semantics are not required;
    /// everything starting with the prefix qualifies).
    async fn list(&self, prefix: &str) -> Result<Vec<String>, AdreconError>;

    /// Delete one object. Deleting a missing object is not an error.
    async fn delete(&self, path: &str) -> Result<(), AdreconError>;

    /// Upload one object, creating any missing hierarchy.
    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), AdreconError>;
}

/// Filesystem-backed store used for dry runs and tests.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// A store rooted at `root`; the directory is created on first write.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn absolute(&self, path: &str) -> PathBuf {
        self.root.join(path)
    }
}

#[async_trait]
impl ObjectStore for LocalStore {
    async fn list(&self, prefix: &str) -> Result<Vec<String>, AdreconError> {
        // The partition layout keeps every artifact directly under its
        // dt= directory, so listing that directory is sufficient.
        let dir = self.absolute(prefix.trim_end_matches('/'));
        let mut keys = Vec::new();
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(keys),
            Err(e) => return Err(AdreconError::Export(format!("list {}: {e}", dir.display()))),
        };
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AdreconError::Export(format!("list {}: {e}", dir.display())))?
        {
            if entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
                keys.push(format!(
                    "{}/{}",
                    prefix.trim_end_matches('/'),
                    entry.file_name().to_string_lossy()
                ));
            }
        }
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, path: &str) -> Result<(), AdreconError> {
        match tokio::fs::remove_file(self.absolute(path)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AdreconError::Export(format!("delete {path}: {e}"))),
        }
    }

    async fn put(&self, path: &str, bytes: Vec<u8>) -> Result<(), AdreconError> {
        let absolute = self.absolute(path);
        if let Some(parent) = absolute.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AdreconError::Export(format!("mkdir {}: {e}", parent.display())))?;
        }
        tokio::fs::write(&absolute, bytes)
            .await
            .map_err(|e| AdreconError::Export(format!("write {path}: {e}")))?;
        debug!(path, "artifact written locally");
        Ok(())
    }
}
