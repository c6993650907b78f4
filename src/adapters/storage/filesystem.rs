//! Filesystem key/value store.
//!
//! Each key is stored as one file under the base directory. File names are
//! the SHA-256 of the key, so arbitrary keys (`ai_context:user@x.com`) map to
//! safe paths. Writes go through a temporary file and a rename.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::ports::{KeyValueStore, StorageError};

#[derive(Debug, Clone)]
pub struct FsKeyValueStore {
    base_dir: PathBuf,
}

impl FsKeyValueStore {
    /// Create new filesystem storage with base directory
    pub fn new(base_dir: impl AsRef<Path>) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    /// Path of the file holding `key`.
    pub fn path_for(&self, key: &str) -> PathBuf {
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        self.base_dir.join(format!("{:x}.json", hasher.finalize()))
    }

    fn map_io(action: &str, e: std::io::Error) -> StorageError {
        if e.kind() == std::io::ErrorKind::PermissionDenied {
            StorageError::PermissionDenied(format!("Cannot {}: {}", action, e))
        } else {
            StorageError::IoError(format!("Failed to {}: {}", action, e))
        }
    }
}

#[async_trait]
impl KeyValueStore for FsKeyValueStore {
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if key.is_empty() {
            return Err(StorageError::InvalidKey("key cannot be empty".to_string()));
        }

        fs::create_dir_all(&self.base_dir)
            .await
            .map_err(|e| Self::map_io("create directory", e))?;

        let file_path = self.path_for(key);
        let temp_path = file_path.with_extension("tmp");
        fs::write(&temp_path, value)
            .await
            .map_err(|e| Self::map_io("write temporary file", e))?;

        // Rename to final location (atomic operation on Unix)
        fs::rename(&temp_path, &file_path)
            .await
            .map_err(|e| Self::map_io("rename file", e))?;

        Ok(())
    }

    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path_for(key)).await {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Self::map_io("read file", e)),
        }
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path_for(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Self::map_io("delete file", e)),
        }
    }
}
