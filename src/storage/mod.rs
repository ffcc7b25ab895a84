//! Byte storage for uploaded files, keyed by a generated relative path.

use async_trait::async_trait;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Stored object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError>;

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError>;

    /// Removing a missing object is not an error
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    async fn copy(&self, from: &str, to: &str) -> Result<(), StorageError> {
        let bytes = self.get(from).await?;
        self.put(to, &bytes).await
    }
}

/// `{uuid}{.ext}`: unique and unrelated to the display name
pub fn generate_storage_key(original_filename: &str) -> String {
    let id = Uuid::new_v4().simple().to_string();
    match Path::new(original_filename).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{}.{}", id, ext.to_ascii_lowercase()),
        _ => id,
    }
}

/// Files under a root directory on local disk
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub async fn new(root: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let root = root.into();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StorageError> {
        let relative = Path::new(key);
        let plain = relative.components().all(|c| matches!(c, Component::Normal(_)));
        if key.is_empty() || !plain {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        tokio::fs::write(&path, bytes).await?;
        debug!("Stored {} bytes at {}", bytes.len(), path.display());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Blob {} already missing on delete", key);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn put_get_copy_delete() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();

        store.put("a.txt", b"hello").await.unwrap();
        store.copy("a.txt", "b.txt").await.unwrap();
        assert_eq!(store.get("b.txt").await.unwrap(), b"hello");

        store.delete("a.txt").await.unwrap();
        store.delete("a.txt").await.unwrap();
        assert!(matches!(store.get("a.txt").await, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn rejects_escaping_keys() {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path()).await.unwrap();
        assert!(matches!(store.put("../x", b"").await, Err(StorageError::InvalidKey(_))));
        assert!(matches!(store.get("/etc/passwd").await, Err(StorageError::InvalidKey(_))));
    }

    #[test]
    fn storage_keys_keep_extension_only() {
        let key = generate_storage_key("Quarterly Report.PDF");
        assert!(key.ends_with(".pdf"));
        assert!(!key.contains("Quarterly"));
        assert_ne!(generate_storage_key("a.csv"), generate_storage_key("a.csv"));
    }
}
