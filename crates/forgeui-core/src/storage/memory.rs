//! In-memory storage implementation.

use super::{BoxFuture, Storage, StorageError, StorageResult};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory storage for testing and ephemeral use.
#[derive(Default)]
pub struct MemoryStorage {
    documents: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create a new empty memory storage.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.documents.read().map(|docs| docs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn lock_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Other(format!("Lock error: {}", e))
}

impl Storage for MemoryStorage {
    fn save(&self, key: &str, value: &str) -> BoxFuture<'_, StorageResult<()>> {
        let key = key.to_string();
        let value = value.to_string();
        Box::pin(async move {
            let mut docs = self.documents.write().map_err(lock_error)?;
            docs.insert(key, value);
            Ok(())
        })
    }

    fn load(&self, key: &str) -> BoxFuture<'_, StorageResult<String>> {
        let key = key.to_string();
        Box::pin(async move {
            let docs = self.documents.read().map_err(lock_error)?;
            docs.get(&key).cloned().ok_or(StorageError::NotFound(key))
        })
    }

    fn delete(&self, key: &str) -> BoxFuture<'_, StorageResult<()>> {
        let key = key.to_string();
        Box::pin(async move {
            let mut docs = self.documents.write().map_err(lock_error)?;
            docs.remove(&key);
            Ok(())
        })
    }

    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>> {
        Box::pin(async move {
            let docs = self.documents.read().map_err(lock_error)?;
            Ok(docs.keys().cloned().collect())
        })
    }

    fn exists(&self, key: &str) -> BoxFuture<'_, StorageResult<bool>> {
        let key = key.to_string();
        Box::pin(async move {
            let docs = self.documents.read().map_err(lock_error)?;
            Ok(docs.contains_key(&key))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pollster::block_on;

    #[test]
    fn test_save_and_load() {
        let storage = MemoryStorage::new();
        block_on(storage.save("test", "{\"a\":1}")).unwrap();
        assert_eq!(block_on(storage.load("test")).unwrap(), "{\"a\":1}");
    }

    #[test]
    fn test_not_found() {
        let storage = MemoryStorage::new();
        let result = block_on(storage.load("nonexistent"));
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_exists_and_delete() {
        let storage = MemoryStorage::new();
        assert!(!block_on(storage.exists("test")).unwrap());
        block_on(storage.save("test", "x")).unwrap();
        assert!(block_on(storage.exists("test")).unwrap());

        block_on(storage.delete("test")).unwrap();
        assert!(!block_on(storage.exists("test")).unwrap());
        // Deleting twice is fine
        block_on(storage.delete("test")).unwrap();
    }

    #[test]
    fn test_list() {
        let storage = MemoryStorage::new();
        block_on(storage.save("doc1", "1")).unwrap();
        block_on(storage.save("doc2", "2")).unwrap();

        let list = block_on(storage.list()).unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.contains(&"doc1".to_string()));
        assert!(list.contains(&"doc2".to_string()));
        assert_eq!(storage.len(), 2);
    }
}
