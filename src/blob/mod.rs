//! Content-addressed blob storage for uploaded document bytes.
//!
//! Shaped like `storage::StorageBackend`: an async trait behind an `Arc`,
//! with an in-memory implementation standing in for a real object store
//! (S3/GCS) at the seam a production deployment would swap in.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};

/// Computes the content hash used both as the blob key and the
/// duplicate-detection key on [`crate::models::Document`].
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// Stores and retrieves raw document bytes by a content-derived key.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String>;
    async fn get(&self, uri: &str) -> Result<Vec<u8>>;
    async fn delete(&self, uri: &str) -> Result<()>;
}

/// In-memory blob store keyed by `mem://<bucket>/<key>` URIs.
///
/// Suitable for tests and for single-process deployments where the blob
/// store is not expected to outlive the process.
pub struct InMemoryBlobStore {
    bucket: String,
    objects: parking_lot::RwLock<HashMap<String, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new(bucket: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            bucket: bucket.into(),
            objects: parking_lot::RwLock::new(HashMap::new()),
        })
    }

    fn uri_for(&self, key: &str) -> String {
        format!("mem://{}/{}", self.bucket, key)
    }
}

#[async_trait]
impl BlobStore for InMemoryBlobStore {
    async fn put(&self, key: &str, bytes: Vec<u8>) -> Result<String> {
        let uri = self.uri_for(key);
        self.objects.write().insert(uri.clone(), bytes);
        Ok(uri)
    }

    async fn get(&self, uri: &str) -> Result<Vec<u8>> {
        self.objects
            .read()
            .get(uri)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("blob {uri}")))
    }

    async fn delete(&self, uri: &str) -> Result<()> {
        self.objects.write().remove(uri);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_hash_is_stable_and_64_hex_chars() {
        let a = content_hash(b"hello world");
        let b = content_hash(b"hello world");
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn different_bytes_hash_differently() {
        assert_ne!(content_hash(b"a"), content_hash(b"b"));
    }

    #[tokio::test]
    async fn round_trips_bytes_through_put_get() {
        let store = InMemoryBlobStore::new("test-bucket");
        let uri = store.put("k1", b"payload".to_vec()).await.unwrap();
        assert!(uri.starts_with("mem://test-bucket/"));
        let bytes = store.get(&uri).await.unwrap();
        assert_eq!(bytes, b"payload");
    }

    #[tokio::test]
    async fn get_missing_key_is_not_found() {
        let store = InMemoryBlobStore::new("test-bucket");
        let err = store.get("mem://test-bucket/missing").await.unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_removes_the_object() {
        let store = InMemoryBlobStore::new("test-bucket");
        let uri = store.put("k1", b"payload".to_vec()).await.unwrap();
        store.delete(&uri).await.unwrap();
        assert!(store.get(&uri).await.is_err());
    }
}
