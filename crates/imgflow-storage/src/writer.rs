use std::sync::Arc;

use bytes::Bytes;
use imgflow_core::PipelineError;

use crate::traits::Storage;

/// Writes encoded artifacts into the derived-artifact store.
///
/// Every write is a whole-object replace, so a redelivered notification overwrites the
/// artifacts of the previous run instead of adding to them.
#[derive(Clone)]
pub struct ArtifactWriter {
    store: Arc<dyn Storage>,
}

impl ArtifactWriter {
    pub fn new(store: Arc<dyn Storage>) -> Self {
        Self { store }
    }

    pub fn bucket(&self) -> &str {
        self.store.bucket()
    }

    /// Write `data` to `bucket`/`key` and return its public URL.
    #[tracing::instrument(skip(self, data), fields(size_bytes = data.len()))]
    pub async fn put(
        &self,
        bucket: &str,
        key: &str,
        data: Bytes,
        content_type: &str,
    ) -> Result<String, PipelineError> {
        if bucket != self.store.bucket() {
            return Err(PipelineError::StorageWrite(format!(
                "no writer configured for bucket '{}'",
                bucket
            )));
        }

        self.store
            .put(key, data, content_type)
            .await
            .map_err(|e| PipelineError::StorageWrite(e.to_string()))
    }
}
