use crate::keys::{join_url, validate_key};
use crate::traits::{ByteStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Duration;

const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Object held by [`MemoryStorage`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub data: Bytes,
    pub content_type: String,
}

/// In-process storage for tests and local demos.
///
/// Downloads are chunked like a network body. Writes to keys containing a registered
/// fragment fail, which lets tests exercise partial-failure paths.
pub struct MemoryStorage {
    bucket: String,
    base_url: String,
    chunk_size: usize,
    objects: RwLock<HashMap<String, StoredObject>>,
    failing_fragments: RwLock<Vec<String>>,
}

impl MemoryStorage {
    pub fn new(bucket: impl Into<String>) -> Self {
        let bucket = bucket.into();
        let base_url = format!("memory://{}", bucket);
        Self {
            bucket,
            base_url,
            chunk_size: DEFAULT_CHUNK_SIZE,
            objects: RwLock::new(HashMap::new()),
            failing_fragments: RwLock::new(Vec::new()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size.max(1);
        self
    }

    /// Make every subsequent `put` to a key containing `fragment` fail.
    pub fn fail_writes_containing(&self, fragment: impl Into<String>) {
        if let Ok(mut fragments) = self.failing_fragments.write() {
            fragments.push(fragment.into());
        }
    }

    /// Store an object directly, bypassing failure injection.
    pub fn insert(&self, key: impl Into<String>, data: impl Into<Bytes>, content_type: &str) {
        if let Ok(mut objects) = self.objects.write() {
            objects.insert(
                key.into(),
                StoredObject {
                    data: data.into(),
                    content_type: content_type.to_string(),
                },
            );
        }
    }

    pub fn get(&self, key: &str) -> Option<StoredObject> {
        self.objects.read().ok()?.get(key).cloned()
    }

    /// All keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .read()
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.objects.read().map(|o| o.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn write_should_fail(&self, key: &str) -> bool {
        self.failing_fragments
            .read()
            .map(|fragments| fragments.iter().any(|f| key.contains(f.as_str())))
            .unwrap_or(false)
    }

    fn lock_poisoned() -> StorageError {
        StorageError::BackendError("memory storage lock poisoned".to_string())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Memory
    }

    fn public_url(&self, storage_key: &str) -> String {
        join_url(&self.base_url, storage_key)
    }

    async fn put(
        &self,
        storage_key: &str,
        data: Bytes,
        content_type: &str,
    ) -> StorageResult<String> {
        validate_key(storage_key)?;
        if self.write_should_fail(storage_key) {
            return Err(StorageError::UploadFailed(format!(
                "injected write failure for {}",
                storage_key
            )));
        }

        let size = data.len();
        self.objects
            .write()
            .map_err(|_| Self::lock_poisoned())?
            .insert(
                storage_key.to_string(),
                StoredObject {
                    data,
                    content_type: content_type.to_string(),
                },
            );

        tracing::debug!(
            bucket = %self.bucket,
            key = %storage_key,
            size_bytes = size,
            "Memory storage put successful"
        );

        Ok(self.public_url(storage_key))
    }

    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream> {
        validate_key(storage_key)?;
        let data = self
            .objects
            .read()
            .map_err(|_| Self::lock_poisoned())?
            .get(storage_key)
            .map(|o| o.data.clone())
            .ok_or_else(|| StorageError::NotFound(storage_key.to_string()))?;

        let chunks: Vec<Result<Bytes, StorageError>> = (0..data.len())
            .step_by(self.chunk_size)
            .map(|start| {
                let end = (start + self.chunk_size).min(data.len());
                Ok(data.slice(start..end))
            })
            .collect();

        Ok(Box::pin(futures::stream::iter(chunks)))
    }

    async fn presigned_put_url(
        &self,
        storage_key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String> {
        validate_key(storage_key)?;
        Ok(format!(
            "{}?x-content-type={}&x-expires={}",
            self.public_url(storage_key),
            percent_encoding::utf8_percent_encode(
                content_type,
                percent_encoding::NON_ALPHANUMERIC
            ),
            expires_in.as_secs()
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;

    #[tokio::test]
    async fn test_download_is_chunked() {
        let storage = MemoryStorage::new("origin").with_chunk_size(4);
        storage.insert("u1/a.jpg", vec![7u8; 10], "image/jpeg");

        let chunks: Vec<usize> = storage
            .download_stream("u1/a.jpg")
            .await
            .unwrap()
            .map(|c| c.unwrap().len())
            .collect()
            .await;
        assert_eq!(chunks, vec![4, 4, 2]);
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let storage = MemoryStorage::new("derived");
        storage.fail_writes_containing("_thumb_300");

        assert!(storage
            .put("u1/a_thumb_150.jpg", Bytes::from_static(b"x"), "image/jpeg")
            .await
            .is_ok());
        assert!(matches!(
            storage
                .put("u1/a_thumb_300.jpg", Bytes::from_static(b"x"), "image/jpeg")
                .await,
            Err(StorageError::UploadFailed(_))
        ));
        assert_eq!(storage.keys(), vec!["u1/a_thumb_150.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_missing_object() {
        let storage = MemoryStorage::new("origin");
        assert!(matches!(
            storage.download_stream("nope.jpg").await,
            Err(StorageError::NotFound(_))
        ));
    }
}
