//! Pipeline error taxonomy
//!
//! Every failure the system can report, from grant issuance through artifact writes, maps
//! to one of these variants. Grant errors reach the caller synchronously through
//! [`AppError`](crate::AppError); processing errors are only visible in logs and in the
//! batch outcome handed back to the notification source.

use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Unsupported content type: {0}")]
    UnsupportedContentType(String),

    #[error("Object exceeds the maximum size of {limit} bytes")]
    SizeExceeded { limit: u64 },

    #[error("Corrupt or unsupported image data: {0}")]
    CorruptInput(String),

    #[error("Storage read failed: {0}")]
    StorageRead(String),

    /// The source can never be read as addressed: absent object, invalid key, or a bucket
    /// other than the origin. Reported as a storage read error but not redelivered.
    #[error("Source object unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Storage write failed: {0}")]
    StorageWrite(String),

    #[error("Processing exceeded its budget of {0:?}")]
    Timeout(Duration),
}

impl PipelineError {
    /// Stable name used in logs and batch outcomes
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::Unauthenticated(_) => "Unauthenticated",
            PipelineError::UnsupportedContentType(_) => "UnsupportedContentType",
            PipelineError::SizeExceeded { .. } => "SizeExceeded",
            PipelineError::CorruptInput(_) => "CorruptInput",
            PipelineError::StorageRead(_) | PipelineError::SourceUnavailable(_) => {
                "StorageReadError"
            }
            PipelineError::StorageWrite(_) => "StorageWriteError",
            PipelineError::Timeout(_) => "Timeout",
        }
    }

    /// Whether redelivering the same notification can succeed.
    ///
    /// Oversized and corrupt originals are immutable, so they fail the same way every time.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PipelineError::StorageRead(_) | PipelineError::StorageWrite(_) | PipelineError::Timeout(_)
        )
    }
}
