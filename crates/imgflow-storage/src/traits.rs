//! Storage abstraction trait
//!
//! This module defines the Storage trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("File not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Chunked object body as returned by [`Storage::download_stream`]
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, StorageError>> + Send>>;

/// Storage abstraction trait
///
/// One instance is bound to one bucket. The origin store and the derived-artifact store
/// are two instances of the same backend kind.
///
/// **Key format:** keys are `/`-separated, must not start with `/` and must not have a `..` segment.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Bucket this instance reads from and writes to
    fn bucket(&self) -> &str;

    /// Get the storage backend type
    fn backend_type(&self) -> StorageBackend;

    /// Publicly readable URL of `storage_key`. Pure; the object need not exist.
    fn public_url(&self, storage_key: &str) -> String;

    /// Write `data` under `storage_key`, replacing any existing object.
    ///
    /// Readers never observe a partially written object. Returns the public URL.
    async fn put(&self, storage_key: &str, data: Bytes, content_type: &str)
        -> StorageResult<String>;

    /// Download an object as a stream of chunks
    async fn download_stream(&self, storage_key: &str) -> StorageResult<ByteStream>;

    /// Generate a presigned PUT URL for a direct client upload.
    ///
    /// The signature covers bucket, key, content type and expiry. Only supported by S3
    /// backends; local disk returns a `ConfigError`.
    async fn presigned_put_url(
        &self,
        storage_key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;
}
