use crate::keys::{join_url, validate_key};
use crate::traits::{ByteStream, Storage, StorageError, StorageResult};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Removes a temp file on drop unless it was moved into place.
///
/// Covers the write future being dropped mid-way (e.g. by a timeout) as well as errors.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn path(&self) -> &Path {
        &self.path
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = std::fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::warn!(path = %self.path.display(), error = %e, "Failed to remove temp file");
                }
            }
        }
    }
}

/// Local filesystem storage implementation
///
/// Each bucket is a directory under the configured root: `{root}/{bucket}/{key}`.
#[derive(Clone)]
pub struct LocalStorage {
    bucket: String,
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `root` - Root directory holding one directory per bucket (e.g., "/var/lib/imgflow")
    /// * `bucket` - Bucket name, used as the directory under `root`
    /// * `base_url` - Base URL for serving files (e.g., "http://localhost:4000/media");
    ///   the bucket name is appended
    pub async fn new(
        root: impl Into<PathBuf>,
        bucket: String,
        base_url: String,
    ) -> StorageResult<Self> {
        validate_key(&bucket)?;
        let base_path = root.into().join(&bucket);

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        let base_url = format!("{}/{}", base_url.trim_end_matches('/'), bucket);

        Ok(LocalStorage {
            bucket,
            base_path,
            base_url,
        })
    }

    /// Convert storage key to filesystem path
    fn key_to_path(&self, storage_key: &str) -> StorageResult<PathBuf> {
        validate_key(storage_key)?;
        Ok(self.base_path.join(storage_key))
    }

    /// Sibling temp path; renamed over the target once fully written
    fn temp_path_for(path: &Path) -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{}.{}-{}.tmp", name, std::process::id(), n))
    }

    async fn write_atomic(path: &Path, data: &[u8]) -> StorageResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut temp = TempFileGuard::new(Self::temp_path_for(path));

        let mut file = fs::File::create(temp.path()).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to create file {}: {}",
                temp.path().display(),
                e
            ))
        })?;
        file.write_all(data).await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to write file {}: {}",
                temp.path().display(),
                e
            ))
        })?;
        file.sync_all().await.map_err(|e| {
            StorageError::UploadFailed(format!(
                "Failed to sync file {}: {}",
                temp.path().display(),
                e
            ))
        })?;
        drop(file);

        fs::rename(temp.path(), path).await.map_err(|e| {
            StorageError::UploadFailed(format!("Failed to move {} into place: {}", path.display(), e))
        })?;
        temp.disarm();
        Ok(())
    }
}

#[async_trait]
impl Storage for LocalStorage {
    fn bucket(&self) -> &str {
        &self.bucket
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }

    fn public_url(&self, storage_key: &str) -> String {
        join_url(&self.base_url, storage_key)
    }

    async fn put(
        &self,
        storage_key: &str,
        data: Bytes,
        _content_type: &str,
    ) -> StorageResult<String> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        Self::write_atomic(&path, &data).await?;

        tracing::info!(
            path = %path.display(),
            key = %storage_key,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(self.public_url(storage_key))
    }

    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream> {
        let path = self.key_to_path(storage_key)?;
        let start = std::time::Instant::now();

        let file = match fs::File::open(&path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(storage_key.to_string()));
            }
            Err(e) => {
                return Err(StorageError::DownloadFailed(format!(
                    "Failed to open file {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        let key = storage_key.to_string();
        let path_display = path.display().to_string();
        let stream = tokio_util::io::ReaderStream::new(file).map(move |result| {
            result.map_err(|e| {
                tracing::error!(
                    error = %e,
                    path = %path_display,
                    key = %key,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Local storage stream download error"
                );
                StorageError::DownloadFailed(format!("Failed to read chunk: {}", e))
            })
        });

        Ok(Box::pin(stream))
    }

    async fn presigned_put_url(
        &self,
        _storage_key: &str,
        _content_type: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        Err(StorageError::ConfigError(
            "Presigned uploads require the S3 storage backend".to_string(),
        ))
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;
    use tempfile::tempdir;

    async fn storage(dir: &Path) -> LocalStorage {
        LocalStorage::new(
            dir,
            "derived".to_string(),
            "http://localhost:4000/media".to_string(),
        )
        .await
        .unwrap()
    }

    async fn read_all(mut stream: ByteStream) -> Vec<u8> {
        let mut out = Vec::new();
        while let Some(chunk) = stream.next().await {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_local_storage_put_download() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let url = storage
            .put("u1/a_thumb_150.jpg", Bytes::from_static(b"jpeg"), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:4000/media/derived/u1/a_thumb_150.jpg");
        assert!(dir.path().join("derived/u1/a_thumb_150.jpg").exists());

        let stream = storage.download_stream("u1/a_thumb_150.jpg").await.unwrap();
        assert_eq!(read_all(stream).await, b"jpeg");
    }

    #[tokio::test]
    async fn test_put_overwrites_and_leaves_no_temp_files() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        storage
            .put("u1/a.webp", Bytes::from_static(b"first"), "image/webp")
            .await
            .unwrap();
        storage
            .put("u1/a.webp", Bytes::from_static(b"second"), "image/webp")
            .await
            .unwrap();

        let stream = storage.download_stream("u1/a.webp").await.unwrap();
        assert_eq!(read_all(stream).await, b"second");

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("derived/u1"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn test_temp_guard_removes_abandoned_file() {
        let dir = tempdir().unwrap();
        let abandoned = dir.path().join(".a.jpg.1-0.tmp");
        std::fs::write(&abandoned, b"partial").unwrap();
        drop(TempFileGuard::new(abandoned.clone()));
        assert!(!abandoned.exists());

        let kept = dir.path().join(".b.jpg.1-1.tmp");
        std::fs::write(&kept, b"done").unwrap();
        let mut guard = TempFileGuard::new(kept.clone());
        guard.disarm();
        drop(guard);
        assert!(kept.exists());
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_temp_file() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;
        // A directory at the target path makes the final rename fail
        std::fs::create_dir_all(dir.path().join("derived/u1/a.jpg")).unwrap();

        let result = storage
            .put("u1/a.jpg", Bytes::from_static(b"jpeg"), "image/jpeg")
            .await;
        assert!(matches!(result, Err(StorageError::UploadFailed(_))));

        let entries: Vec<_> = std::fs::read_dir(dir.path().join("derived/u1"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(entries, vec!["a.jpg".to_string()]);
    }

    #[tokio::test]
    async fn test_path_traversal_rejected() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.download_stream("../../../etc/passwd").await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));

        let result = storage
            .put("/etc/passwd", Bytes::from_static(b"x"), "text/plain")
            .await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_missing_object_is_not_found() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage.download_stream("u1/missing.jpg").await;
        assert!(matches!(result, Err(StorageError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_presign_unsupported() {
        let dir = tempdir().unwrap();
        let storage = storage(dir.path()).await;

        let result = storage
            .presigned_put_url("u1/a.jpg", "image/jpeg", Duration::from_secs(60))
            .await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }
}
