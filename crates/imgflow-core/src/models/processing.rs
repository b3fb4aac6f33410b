use std::time::Duration;

use super::{DerivedArtifact, VariantKind};
use crate::pipeline_error::PipelineError;

/// Outcome of producing and writing one artifact
#[derive(Debug, Clone)]
pub struct ArtifactOutcome {
    pub kind: VariantKind,
    pub key: String,
    pub result: Result<DerivedArtifact, PipelineError>,
}

impl ArtifactOutcome {
    pub fn is_written(&self) -> bool {
        self.result.is_ok()
    }
}

/// Aggregated result of processing one original.
///
/// Only built once every artifact job has settled, in configuration order regardless of
/// completion order.
#[derive(Debug, Clone)]
pub struct ProcessingResult {
    pub bucket: String,
    pub source_key: String,
    pub source_width: u32,
    pub source_height: u32,
    pub outcomes: Vec<ArtifactOutcome>,
    pub duration: Duration,
}

impl ProcessingResult {
    /// True only when every configured artifact was written.
    pub fn is_success(&self) -> bool {
        !self.outcomes.is_empty() && self.outcomes.iter().all(ArtifactOutcome::is_written)
    }

    pub fn written(&self) -> impl Iterator<Item = &DerivedArtifact> {
        self.outcomes.iter().filter_map(|o| o.result.as_ref().ok())
    }

    pub fn failures(&self) -> impl Iterator<Item = (&str, &PipelineError)> {
        self.outcomes
            .iter()
            .filter_map(|o| o.result.as_ref().err().map(|e| (o.key.as_str(), e)))
    }

    /// Collapse a partially failed result into the error reported for the whole unit.
    ///
    /// When every failure is permanent the first one is returned as-is; otherwise the unit
    /// is reported as a retryable write failure naming each failed key.
    pub fn into_result(self) -> Result<Self, PipelineError> {
        if self.is_success() {
            return Ok(self);
        }
        if !self.failures().any(|(_, e)| e.is_retryable()) {
            if let Some((_, first)) = self.failures().next() {
                return Err(first.clone());
            }
        }
        let failed: Vec<&str> = self.failures().map(|(key, _)| key).collect();
        Err(PipelineError::StorageWrite(format!(
            "{} of {} artifacts failed for {}: {}",
            failed.len(),
            self.outcomes.len(),
            self.source_key,
            failed.join(", ")
        )))
    }
}
