//! imgflow core library
//!
//! This crate provides the domain models, error types, configuration and the derived-key
//! naming contract shared by the upload authorizer and the processing pipeline.
//!
//! The two halves of the system never talk to each other at runtime. They agree only on
//! [`naming::derived_key`]: the authorizer predicts artifact URLs with it, and the processor
//! writes artifacts under the keys it returns.

pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod naming;
pub mod pipeline_error;
pub mod storage_types;

// Re-export commonly used types
pub use config::{BaseConfig, Config, PipelineConfig};
pub use error::{AppError, ErrorMetadata, LogLevel};
pub use models::{
    ArtifactFormat, ArtifactOutcome, DerivedArtifact, EventKind, ImageContentType,
    PredictedArtifact, ProcessingNotification, ProcessingResult, UploadGrant, VariantKind,
    VariantSpec,
};
pub use pipeline_error::PipelineError;
pub use storage_types::StorageBackend;
