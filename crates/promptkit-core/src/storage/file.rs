//! File-backed key-value store.
//!
//! Each key is stored as `<data_dir>/<key>.json`. Writes go through a
//! temporary file followed by a rename so a crash never leaves a
//! half-written blob behind.

use crate::error::{PromptKitError, Result};
use crate::storage::KvStore;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File-backed key-value store rooted at a data directory.
///
/// The directory is created lazily on the first write.
#[derive(Debug, Clone)]
pub struct FileKvStore {
    data_dir: PathBuf,
}

impl FileKvStore {
    /// Creates a store rooted at `data_dir`.
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    /// Returns the directory holding the blobs.
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(PromptKitError::StorageWriteError(format!(
                "invalid storage key: {:?}",
                key
            )));
        }
        Ok(self.data_dir.join(format!("{key}.json")))
    }
}

impl KvStore for FileKvStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PromptKitError::StorageReadError(format!(
                "{}: {}",
                path.display(),
                e
            ))),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let write_err =
            |e: std::io::Error| PromptKitError::StorageWriteError(format!("{}: {}", path.display(), e));

        std::fs::create_dir_all(&self.data_dir).map_err(write_err)?;

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value).map_err(write_err)?;
        std::fs::rename(&tmp, &path).map_err(write_err)?;

        tracing::debug!(key, path = %path.display(), "stored value");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PromptKitError::StorageWriteError(format!(
                "{}: {}",
                path.display(),
                e
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_get_missing_key_returns_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileKvStore::new(temp_dir.path().join("data"));
        assert_eq!(store.get("favorites").unwrap(), None);
    }

    #[test]
    fn test_set_creates_directory_and_file() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("nested").join("data");
        let store = FileKvStore::new(&data_dir);

        store.set("custom-templates", "[]").unwrap();

        assert!(data_dir.join("custom-templates.json").is_file());
        assert!(!data_dir.join("custom-templates.json.tmp").exists());
        assert_eq!(store.get("custom-templates").unwrap(), Some("[]".to_string()));
    }

    #[test]
    fn test_set_overwrites_and_remove_deletes() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileKvStore::new(temp_dir.path());

        store.set("favorites", "[\"a\"]").unwrap();
        store.set("favorites", "[\"b\"]").unwrap();
        assert_eq!(store.get("favorites").unwrap(), Some("[\"b\"]".to_string()));

        store.remove("favorites").unwrap();
        assert_eq!(store.get("favorites").unwrap(), None);

        // Removing again is not an error.
        store.remove("favorites").unwrap();
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let temp_dir = TempDir::new().unwrap();
        let store = FileKvStore::new(temp_dir.path());

        assert!(matches!(
            store.set("../escape", "x"),
            Err(PromptKitError::StorageWriteError(_))
        ));
        assert!(store.get("").is_err());
    }
}
