//! Storage abstraction for persistence.
//!
//! Backends store opaque JSON strings under string keys. The catalog lives
//! under [`STATE_KEY`], each file's element tree under [`file_key`].

mod autosave;
#[cfg(not(target_arch = "wasm32"))]
mod file;
mod memory;

pub use autosave::{AutoSave, DEFAULT_AUTOSAVE_INTERVAL_SECS, DEFAULT_DEBOUNCE_MS};
#[cfg(not(target_arch = "wasm32"))]
pub use file::FileStorage;
pub use memory::MemoryStorage;

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Key of the catalog snapshot.
pub const STATE_KEY: &str = "forgeui_state";

/// Prefix of per-file element documents.
pub const FILE_KEY_PREFIX: &str = "forgeui_file_";

/// Storage key of a file's element document.
pub fn file_key(file_id: &str) -> String {
    format!("{FILE_KEY_PREFIX}{file_id}")
}

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Document not found: {0}")]
    NotFound(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Storage error: {0}")]
    Other(String),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Serialization(err.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Trait for key/value storage backends.
///
/// Implementations can keep documents in memory or on the filesystem. The
/// editor drives the futures to completion at flush points, so a backend
/// may also wrap a genuinely asynchronous store.
pub trait Storage: Send + Sync {
    /// Save a value, replacing any previous one.
    fn save(&self, key: &str, value: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// Load a value.
    fn load(&self, key: &str) -> BoxFuture<'_, StorageResult<String>>;

    /// Delete a value. Deleting a missing key is not an error.
    fn delete(&self, key: &str) -> BoxFuture<'_, StorageResult<()>>;

    /// List all keys.
    fn list(&self) -> BoxFuture<'_, StorageResult<Vec<String>>>;

    /// Check if a key exists.
    fn exists(&self, key: &str) -> BoxFuture<'_, StorageResult<bool>>;
}
