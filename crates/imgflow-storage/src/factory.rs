#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{MemoryStorage, Storage, StorageBackend, StorageError, StorageResult};
use imgflow_core::Config;
use std::sync::Arc;

/// The origin store clients upload into and the read-optimized store for derived artifacts
#[derive(Clone)]
pub struct StoragePair {
    pub origin: Arc<dyn Storage>,
    pub derived: Arc<dyn Storage>,
}

/// Create both stores based on configuration.
///
/// `PUBLIC_BASE_URL`, when set, replaces the derived store's read URL prefix only.
pub async fn create_storages(config: &Config) -> StorageResult<StoragePair> {
    let origin = create_storage(config, config.origin_bucket(), None).await?;
    let derived = create_storage(
        config,
        config.derived_bucket(),
        config.public_base_url().map(String::from),
    )
    .await?;

    tracing::info!(
        backend = %config.storage_backend(),
        origin_bucket = %origin.bucket(),
        derived_bucket = %derived.bucket(),
        "Storage initialized"
    );

    Ok(StoragePair { origin, derived })
}

/// Create a storage backend for one bucket
pub async fn create_storage(
    config: &Config,
    bucket: &str,
    public_base_url: Option<String>,
) -> StorageResult<Arc<dyn Storage>> {
    match config.storage_backend() {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let region = config.s3_region().map(String::from).ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;
            let endpoint = config.s3_endpoint().map(String::from);

            let storage = S3Storage::new(bucket.to_string(), region, endpoint, public_base_url).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let root = config.local_storage_path().map(String::from).ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let base_url = match public_base_url {
                Some(url) => url,
                None => config
                    .local_storage_base_url()
                    .map(String::from)
                    .ok_or_else(|| {
                        StorageError::ConfigError(
                            "LOCAL_STORAGE_BASE_URL not configured".to_string(),
                        )
                    })?,
            };

            let storage = LocalStorage::new(root, bucket.to_string(), base_url).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        StorageBackend::Memory => {
            let mut storage = MemoryStorage::new(bucket);
            if let Some(url) = public_base_url {
                storage = storage.with_base_url(url);
            }
            Ok(Arc::new(storage))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn memory_config(public_base_url: Option<&str>) -> Config {
        Config::from_lookup(|key| match key {
            "JWT_SECRET" => Some("s".repeat(32)),
            "EVENT_WEBHOOK_TOKEN" => Some("t".repeat(16)),
            "ORIGIN_BUCKET" => Some("origin".to_string()),
            "DERIVED_BUCKET" => Some("derived".to_string()),
            "STORAGE_BACKEND" => Some("memory".to_string()),
            "PUBLIC_BASE_URL" => public_base_url.map(String::from),
            _ => None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_create_memory_storages() {
        let stores = create_storages(&memory_config(None)).await.unwrap();
        assert_eq!(stores.origin.bucket(), "origin");
        assert_eq!(stores.derived.bucket(), "derived");
        assert_eq!(stores.derived.backend_type(), StorageBackend::Memory);
    }

    #[tokio::test]
    async fn test_public_base_url_applies_to_derived_only() {
        let stores = create_storages(&memory_config(Some("https://cdn.example.com")))
            .await
            .unwrap();
        assert_eq!(
            stores.derived.public_url("u1/a.webp"),
            "https://cdn.example.com/u1/a.webp"
        );
        assert_eq!(stores.origin.public_url("u1/a.jpg"), "memory://origin/u1/a.jpg");
    }
}
