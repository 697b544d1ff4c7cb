//! File-based storage implementation for native platforms.

use super::{BoxFuture, Storage, StorageError, StorageResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// File-based storage for native platforms.
///
/// Stores each key as a JSON file in a directory.
pub struct FileStorage {
    /// Base directory for document storage.
    base_path: PathBuf,
}

impl FileStorage {
    /// Create a new file storage with the given base directory.
    ///
    /// Creates the directory if it doesn't exist.
    pub fn new(base_path: PathBuf) -> StorageResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                StorageError::Io(format!("Failed to create storage directory: {}", e))
            })?;
        }
        Ok(Self { base_path })
    }

    /// Create file storage in the default location.
    ///
    /// On Unix: `~/.local/share/forgeui/projects/`
    /// On Windows: `%LOCALAPPDATA%\forgeui\projects\`
    pub fn default_location() -> StorageResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| StorageError::Io("Could not determine home directory".to_string()))?;
        Self::new(base.join("forgeui").join("projects"))
    }

    /// Get the file path for a key.
    fn document_path(&self, key: &str) -> PathBuf {
        // Sanitize the key to be safe for filenames
        let safe_key: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.base_path.join(format!("{}.json", safe_key))
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl Storage for FileStorage {
    fn save(&self, key: &str, value: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.document_path(key);
        let value = value.to_string();
        Box::pin(async move {
            // Write to a sibling and rename so a crash never leaves half a file
            let tmp = path.with_extension("json.tmp");
            fs::write(&tmp, value).map_err(|e| {
                StorageError::Io(format!("Failed to write {}: {}", tmp.display(), e))
            })?;
            fs::rename(&tmp, &path).map_err(|e| {
                StorageError::Io(format!("Failed to write {}: {}", path.display(), e))
            })
        })
    }

    fn load(&self, key: &str) -> BoxFuture<'_, StorageResult<String>> {
        let path = self.document_path(key);
        let key = key.to_string();
        Box::pin(async move {
            fs::read_to_string(&path).map_err(|e| match e.kind() {
                ErrorKind::NotFound => StorageError::NotFound(key),
                _ => StorageError::Io(format!("Failed to read {}: {}", path.display(), e)),
            })
        })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, StorageResult<()>> {
        let path = self.document_path(key);
        Box::pin(async move {
            if path.exists() {
                fs::remove_file(&path).map_err(|e| {
                    StorageError::Io(format!("Failed to delete {}: {}", path.display(), e))
                })?;
            }
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        let base = self.base_path.clone();
        Box::pin(async move {
            if !base.exists() {
                return Ok(vec![]);
            }
            let entries = fs::read_dir(&base)
                .map_err(|e| StorageError::Io(format!("Failed to read directory: {}", e)))?;

            let mut keys = Vec::new();
            for entry in entries.flatten() {
                let path = entry.path();
                // Only include .json files
                if path.extension().is_some_and(|e| e == "json") {
                    if let Some(name) = path.file_stem().and_then(|n| n.to_str()) {
                        keys.push(name.to_string());
                    }
                }
            }
            Ok(keys)
        })
    }

    fn exists(&self, key: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let path = self.document_path(key);
        Box::pin(async move { Ok(path.exists()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollster::block_on;
    use tempfile::tempdir;

    #[test]
    fn test_file_storage_save_load() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();

        block_on(storage.save("forgeui_state", "{\"gridSize\":20}")).unwrap();
        let loaded = block_on(storage.load("forgeui_state")).unwrap();
        assert_eq!(loaded, "{\"gridSize\":20}");
        assert!(dir.path().join("forgeui_state.json").exists());
    }

    #[test]
    fn test_file_storage_not_found() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        let result = block_on(storage.load("nonexistent"));
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_file_storage_list() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        block_on(storage.save(crate::storage::STATE_KEY, "{}")).unwrap();
        block_on(storage.save(&crate::storage::file_key("a1b2"), "{}")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let mut list = block_on(storage.list()).unwrap();
        list.sort();
        assert_eq!(list, vec!["forgeui_file_a1b2", "forgeui_state"]);
    }

    #[test]
    fn test_file_storage_delete() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        block_on(storage.save("test", "x")).unwrap();
        assert!(block_on(storage.exists("test")).unwrap());

        block_on(storage.delete("test")).unwrap();
        assert!(!block_on(storage.exists("test")).unwrap());
    }

    #[test]
    fn test_file_storage_sanitizes_key() {
        let dir = tempdir().unwrap();
        let storage = FileStorage::new(dir.path().to_path_buf()).unwrap();
        block_on(storage.save("test/doc:with*special", "x")).unwrap();
        assert_eq!(block_on(storage.load("test/doc:with*special")).unwrap(), "x");
    }

    #[test]
    fn test_creates_missing_directory() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let storage = FileStorage::new(nested.clone()).unwrap();
        assert_eq!(storage.base_path(), nested.as_path());
        assert!(nested.is_dir());
    }
}
