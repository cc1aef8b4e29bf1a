//! Opaque key/value response store for sluice pipelines.
//!
//! The store holds the serialized bytes of the last successful response per
//! canonical request key. It is deliberately shape- and type-agnostic: the
//! pipeline decides what the bytes mean. Both operations are best-effort;
//! callers are expected to swallow [`StoreError`] rather than fail a request
//! over a cache problem.

use std::collections::HashMap;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("storage backend failure: {0}")]
    Backend(String),
}

/// Key/value persistence for serialized response payloads.
///
/// Writes overwrite unconditionally (last write wins); there is no
/// read-modify-write transaction and no explicit deletion. Eviction, if any,
/// belongs to the implementation.
pub trait CacheStore: Send + Sync {
    fn read(
        &self,
        key: &str,
    ) -> impl Future<Output = Result<Option<Bytes>, StoreError>> + Send;

    fn write(
        &self,
        key: &str,
        value: Bytes,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;
}

/// In-memory [`CacheStore`] backed by a read/write-locked map.
///
/// Concurrent reads do not block each other; concurrent writes to the same
/// key resolve by last write wins.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, Bytes>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

impl CacheStore for MemoryStore {
    async fn read(&self, key: &str) -> Result<Option<Bytes>, StoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write(&self, key: &str, value: Bytes) -> Result<(), StoreError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trip_yields_equal_bytes() {
        let store = MemoryStore::new();
        let value = Bytes::from_static(b"{\"id\":1}");
        store.write("GET /users", value.clone()).await.unwrap();
        assert_eq!(store.read("GET /users").await.unwrap(), Some(value));
    }

    #[tokio::test]
    async fn missing_key_reads_none() {
        let store = MemoryStore::new();
        assert_eq!(store.read("GET /absent").await.unwrap(), None);
    }

    #[tokio::test]
    async fn overwrite_is_last_write_wins() {
        let store = MemoryStore::new();
        store
            .write("GET /users", Bytes::from_static(b"old"))
            .await
            .unwrap();
        store
            .write("GET /users", Bytes::from_static(b"new"))
            .await
            .unwrap();
        assert_eq!(
            store.read("GET /users").await.unwrap(),
            Some(Bytes::from_static(b"new"))
        );
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn keys_are_independent() {
        let store = MemoryStore::new();
        store
            .write("GET /a", Bytes::from_static(b"a"))
            .await
            .unwrap();
        store
            .write("GET /b", Bytes::from_static(b"b"))
            .await
            .unwrap();
        assert_eq!(
            store.read("GET /a").await.unwrap(),
            Some(Bytes::from_static(b"a"))
        );
        assert_eq!(
            store.read("GET /b").await.unwrap(),
            Some(Bytes::from_static(b"b"))
        );
    }
}
