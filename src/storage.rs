//! Blob/text storage for chunk bodies and generated reports.
//!
//! The pipeline persists every chunk's raw text under a stable key so the embedding indexer
//! and the QA service can fetch it later without re-chunking. Two implementations are
//! provided: an in-process map (default, also used in tests) and a filesystem store for
//! deployments that want texts to survive restarts.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;
use tokio::sync::RwLock;

/// Errors surfaced by text storage backends.
#[derive(Debug, Error)]
pub enum TextStoreError {
    /// Underlying I/O failure while reading or writing a text.
    #[error("text storage I/O failed for key '{key}': {source}")]
    Io {
        /// Storage key involved in the failing operation.
        key: String,
        /// Underlying filesystem error.
        #[source]
        source: std::io::Error,
    },
}

/// Keyed text storage with put/get semantics.
#[async_trait]
pub trait TextStore: Send + Sync {
    /// Store text under the given key, replacing any previous value.
    async fn put(&self, key: &str, text: &str) -> Result<(), TextStoreError>;

    /// Fetch the text stored under the key, or `None` when absent.
    async fn get(&self, key: &str) -> Result<Option<String>, TextStoreError>;
}

/// In-process text store backed by a `RwLock`ed map.
#[derive(Default)]
pub struct InMemoryTextStore {
    texts: RwLock<HashMap<String, String>>,
}

impl InMemoryTextStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TextStore for InMemoryTextStore {
    async fn put(&self, key: &str, text: &str) -> Result<(), TextStoreError> {
        self.texts
            .write()
            .await
            .insert(key.to_string(), text.to_string());
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, TextStoreError> {
        Ok(self.texts.read().await.get(key).cloned())
    }
}

/// Filesystem-backed text store. Keys map to paths below the root directory; path
/// separators in keys become subdirectories.
pub struct FsTextStore {
    root: PathBuf,
}

impl FsTextStore {
    /// Create a store rooted at the given directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let sanitized: String = key
            .chars()
            .map(|c| if c.is_alphanumeric() || matches!(c, '/' | '-' | '_' | '.') {
                c
            } else {
                '_'
            })
            .collect();
        self.root.join(sanitized).with_extension("txt")
    }
}

#[async_trait]
impl TextStore for FsTextStore {
    async fn put(&self, key: &str, text: &str) -> Result<(), TextStoreError> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|source| TextStoreError::Io {
                    key: key.to_string(),
                    source,
                })?;
        }
        tokio::fs::write(&path, text)
            .await
            .map_err(|source| TextStoreError::Io {
                key: key.to_string(),
                source,
            })
    }

    async fn get(&self, key: &str) -> Result<Option<String>, TextStoreError> {
        let path = self.path_for(key);
        match tokio::fs::read_to_string(&path).await {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(TextStoreError::Io {
                key: key.to_string(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_roundtrips_and_overwrites() {
        let store = InMemoryTextStore::new();
        store.put("chunks/a/0", "first").await.unwrap();
        store.put("chunks/a/0", "second").await.unwrap();
        assert_eq!(store.get("chunks/a/0").await.unwrap().as_deref(), Some("second"));
        assert!(store.get("chunks/a/1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn fs_store_sanitizes_keys() {
        let dir = std::env::temp_dir().join(format!("filing-digest-test-{}", uuid::Uuid::new_v4()));
        let store = FsTextStore::new(&dir);
        store.put("chunks/acc 1/Risk Factors/0", "body").await.unwrap();
        let text = store.get("chunks/acc 1/Risk Factors/0").await.unwrap();
        assert_eq!(text.as_deref(), Some("body"));
        tokio::fs::remove_dir_all(&dir).await.ok();
    }
}
