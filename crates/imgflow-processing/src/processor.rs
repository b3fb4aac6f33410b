//! Image processor - derives every configured artifact from one original.

use std::sync::Arc;
use std::time::{Duration, Instant};

use image::{DynamicImage, GenericImageView};
use imgflow_core::constants::{
    DEFAULT_ENCODE_CONCURRENCY, DEFAULT_MAX_UPLOAD_SIZE_MB, DEFAULT_PROCESSING_TIMEOUT_SECS,
    DEFAULT_QUALITY, DEFAULT_THUMBNAIL_SIZES,
};
use imgflow_core::naming::{artifact_kinds, derived_key};
use imgflow_core::{
    ArtifactOutcome, Config, DerivedArtifact, PipelineError, ProcessingResult, VariantKind,
    VariantSpec,
};
use imgflow_storage::{ArtifactWriter, Storage, StorageError, StreamBuffer};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::compression::{EncodedImage, ImageCompressor};
use crate::decode::decode_upright;
use crate::resize::ImageResize;

/// Processing settings, taken from [`Config`] once at start-up
#[derive(Debug, Clone)]
pub struct ProcessorConfig {
    pub origin_bucket: String,
    pub max_input_bytes: u64,
    pub variants: Vec<VariantSpec>,
    pub alternate_quality: u8,
    pub encode_concurrency: usize,
    pub timeout: Duration,
}

impl ProcessorConfig {
    /// Defaults for everything but the bucket
    pub fn new(origin_bucket: impl Into<String>) -> Self {
        let variants = DEFAULT_THUMBNAIL_SIZES
            .split(',')
            .filter_map(|s| VariantSpec::parse(s, DEFAULT_QUALITY).ok())
            .collect();
        Self {
            origin_bucket: origin_bucket.into(),
            max_input_bytes: DEFAULT_MAX_UPLOAD_SIZE_MB * 1024 * 1024,
            variants,
            alternate_quality: DEFAULT_QUALITY,
            encode_concurrency: DEFAULT_ENCODE_CONCURRENCY,
            timeout: Duration::from_secs(DEFAULT_PROCESSING_TIMEOUT_SECS),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            origin_bucket: config.origin_bucket().to_string(),
            max_input_bytes: config.max_upload_size_bytes(),
            variants: config.thumbnail_sizes().to_vec(),
            alternate_quality: config.alternate_format_quality(),
            encode_concurrency: config.encode_concurrency(),
            timeout: config.processing_timeout(),
        }
    }
}

/// One artifact to produce
#[derive(Debug, Clone)]
struct ArtifactJob {
    kind: VariantKind,
    key: String,
    quality: u8,
}

/// Turns an original in the origin store into its derived artifacts.
///
/// Holds no per-object state; concurrent calls for different keys are independent.
#[derive(Clone)]
pub struct ImageProcessor {
    origin: Arc<dyn Storage>,
    writer: ArtifactWriter,
    config: Arc<ProcessorConfig>,
}

impl ImageProcessor {
    pub fn new(origin: Arc<dyn Storage>, writer: ArtifactWriter, config: ProcessorConfig) -> Self {
        Self {
            origin,
            writer,
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    fn plan(&self, source_key: &str) -> Vec<ArtifactJob> {
        artifact_kinds(&self.config.variants)
            .into_iter()
            .map(|kind| {
                let quality = match kind {
                    VariantKind::Thumbnail { width, height } => self
                        .config
                        .variants
                        .iter()
                        .find(|v| v.width == width && v.height == height)
                        .map(|v| v.quality)
                        .unwrap_or(DEFAULT_QUALITY),
                    VariantKind::AlternateFormat => self.config.alternate_quality,
                };
                ArtifactJob {
                    key: derived_key(source_key, &kind),
                    kind,
                    quality,
                }
            })
            .collect()
    }

    /// Derive and write every artifact for `bucket`/`key`.
    ///
    /// `Err` means nothing was attempted past the failing step (read, size check, decode) or
    /// the time budget ran out, in which case unfinished jobs are aborted. `Ok` carries one
    /// outcome per artifact, each of which may have failed on its own.
    #[tracing::instrument(skip_all, fields(bucket = %bucket, key = %key))]
    pub async fn process(&self, bucket: &str, key: &str) -> Result<ProcessingResult, PipelineError> {
        let start = Instant::now();

        match tokio::time::timeout(self.config.timeout, self.run(bucket, key, start)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!(
                    timeout_secs = self.config.timeout.as_secs(),
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Processing exceeded its time budget, outstanding jobs aborted"
                );
                Err(PipelineError::Timeout(self.config.timeout))
            }
        }
    }

    async fn run(
        &self,
        bucket: &str,
        key: &str,
        start: Instant,
    ) -> Result<ProcessingResult, PipelineError> {
        if bucket != self.config.origin_bucket {
            return Err(PipelineError::SourceUnavailable(format!(
                "bucket '{}' is not the origin bucket",
                bucket
            )));
        }

        let stream = self
            .origin
            .download_stream(key)
            .await
            .map_err(read_error)?;

        let data = StreamBuffer::new(self.config.max_input_bytes)
            .materialize(stream)
            .await?;
        let size_bytes = data.len();

        let image = tokio::task::spawn_blocking(move || decode_upright(&data))
            .await
            .map_err(|e| PipelineError::CorruptInput(format!("decoder panicked: {}", e)))??;
        let (source_width, source_height) = image.dimensions();

        tracing::debug!(
            size_bytes = size_bytes,
            width = source_width,
            height = source_height,
            "Original decoded"
        );

        let outcomes = self.produce_all(key, Arc::new(image)).await;

        let result = ProcessingResult {
            bucket: bucket.to_string(),
            source_key: key.to_string(),
            source_width,
            source_height,
            outcomes,
            duration: start.elapsed(),
        };

        let failed = result.failures().count();
        if failed == 0 {
            tracing::info!(
                artifacts = result.outcomes.len(),
                duration_ms = result.duration.as_secs_f64() * 1000.0,
                "Image processed"
            );
        } else {
            for (artifact_key, error) in result.failures() {
                tracing::error!(
                    artifact_key = %artifact_key,
                    error_kind = error.kind(),
                    error = %error,
                    "Artifact failed"
                );
            }
            tracing::warn!(
                artifacts = result.outcomes.len(),
                failed = failed,
                duration_ms = result.duration.as_secs_f64() * 1000.0,
                "Image processed with failures"
            );
        }

        Ok(result)
    }

    /// Run every job to completion and return outcomes in plan order.
    ///
    /// Dropping the returned future drops the `JoinSet`, which aborts jobs still running.
    async fn produce_all(&self, source_key: &str, image: Arc<DynamicImage>) -> Vec<ArtifactOutcome> {
        let jobs = self.plan(source_key);
        let permits = Arc::new(Semaphore::new(self.config.encode_concurrency.max(1)));
        let mut set = JoinSet::new();

        for (index, job) in jobs.iter().cloned().enumerate() {
            let image = image.clone();
            let permits = permits.clone();
            let writer = self.writer.clone();
            let source_key = source_key.to_string();

            set.spawn(async move {
                let result = produce(image, &job, permits, &writer, &source_key).await;
                (index, result)
            });
        }

        let mut results: Vec<Option<Result<DerivedArtifact, PipelineError>>> =
            vec![None; jobs.len()];
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok((index, result)) => results[index] = Some(result),
                Err(e) => tracing::error!(error = %e, "Artifact job panicked"),
            }
        }

        jobs.into_iter()
            .zip(results)
            .map(|(job, result)| ArtifactOutcome {
                kind: job.kind,
                key: job.key,
                result: result.unwrap_or_else(|| {
                    Err(PipelineError::StorageWrite("artifact job did not complete".to_string()))
                }),
            })
            .collect()
    }
}

/// Absent objects and malformed keys fail the same way on every delivery.
fn read_error(err: StorageError) -> PipelineError {
    match err {
        e @ (StorageError::NotFound(_) | StorageError::InvalidKey(_)) => {
            PipelineError::SourceUnavailable(e.to_string())
        }
        other => PipelineError::StorageRead(other.to_string()),
    }
}

/// Encode one artifact on the blocking pool, then write it.
async fn produce(
    image: Arc<DynamicImage>,
    job: &ArtifactJob,
    permits: Arc<Semaphore>,
    writer: &ArtifactWriter,
    source_key: &str,
) -> Result<DerivedArtifact, PipelineError> {
    let encoded = {
        // Held only while encoding; the write below does not count against the pool.
        let _permit = permits
            .acquire_owned()
            .await
            .map_err(|_| PipelineError::StorageWrite("encode pool closed".to_string()))?;

        let kind = job.kind;
        let quality = job.quality;
        tokio::task::spawn_blocking(move || render(&image, kind, quality))
            .await
            .map_err(|e| PipelineError::CorruptInput(format!("encoder panicked: {}", e)))??
    };

    let size_bytes = encoded.data.len() as u64;
    writer
        .put(
            writer.bucket(),
            &job.key,
            encoded.data,
            encoded.format.to_mime_type(),
        )
        .await?;

    Ok(DerivedArtifact {
        source_key: source_key.to_string(),
        kind: job.kind,
        key: job.key.clone(),
        width: encoded.width,
        height: encoded.height,
        format: encoded.format,
        quality: job.quality,
        size_bytes,
    })
}

/// Pure CPU step: derive the pixels for `kind` and encode them.
fn render(image: &DynamicImage, kind: VariantKind, quality: u8) -> Result<EncodedImage, PipelineError> {
    match kind {
        VariantKind::Thumbnail { width, height } => {
            let thumbnail = ImageResize::cover_crop(image, width, height);
            ImageCompressor::encode(&thumbnail, kind.format(), quality)
        }
        VariantKind::AlternateFormat => ImageCompressor::encode(image, kind.format(), quality),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgflow_storage::MemoryStorage;

    #[test]
    fn test_default_config() {
        let config = ProcessorConfig::new("origin");
        let sizes: Vec<(u32, u32)> = config.variants.iter().map(|v| (v.width, v.height)).collect();
        assert_eq!(sizes, vec![(150, 150), (300, 300), (600, 400)]);
        assert_eq!(config.max_input_bytes, 10 * 1024 * 1024);
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_plan_follows_naming_contract() {
        let processor = ImageProcessor::new(
            Arc::new(MemoryStorage::new("origin")),
            ArtifactWriter::new(Arc::new(MemoryStorage::new("derived"))),
            ProcessorConfig {
                alternate_quality: 70,
                ..ProcessorConfig::new("origin")
            },
        );

        let plan = processor.plan("u/f.jpg");
        let keys: Vec<&str> = plan.iter().map(|j| j.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "u/f_thumb_150.jpg",
                "u/f_thumb_300.jpg",
                "u/f_thumb_600.jpg",
                "u/f.webp"
            ]
        );
        assert_eq!(plan[0].quality, 85);
        assert_eq!(plan[3].quality, 70);
    }
}
