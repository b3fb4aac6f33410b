//! Application setup and initialization
//!
//! Everything main.rs wires together, split out so tests can build the same router over
//! in-memory storage.

pub mod routes;
pub mod server;

use std::sync::Arc;

use anyhow::{Context, Result};
use imgflow_core::Config;
use imgflow_processing::{ImageProcessor, ProcessorConfig};
use imgflow_storage::{create_storages, ArtifactWriter, StoragePair};
use imgflow_worker::{DispatcherConfig, EventDispatcher};

use crate::auth::{IdentityVerifier, JwtVerifier};
use crate::services::{UploadAuthorizer, UploadAuthorizerConfig};
use crate::state::AppState;

/// Build storages from configuration, then the state and router over them.
pub async fn initialize_app(config: Config) -> Result<(Arc<AppState>, axum::Router)> {
    let storages = create_storages(&config)
        .await
        .context("Failed to initialize storage")?;

    build_app(config, storages)
}

/// Wire authorizer, processor and dispatcher over the given stores.
pub fn build_app(config: Config, storages: StoragePair) -> Result<(Arc<AppState>, axum::Router)> {
    crate::error::set_production_mode(config.is_production());

    let authorizer = UploadAuthorizer::new(
        storages.origin.clone(),
        storages.derived.clone(),
        UploadAuthorizerConfig::from_config(&config),
    );

    let processor = ImageProcessor::new(
        storages.origin.clone(),
        ArtifactWriter::new(storages.derived.clone()),
        ProcessorConfig::from_config(&config),
    );
    let dispatcher = EventDispatcher::new(
        Arc::new(processor),
        DispatcherConfig::from_config(&config),
    );

    let verifier: Arc<dyn IdentityVerifier> = Arc::new(JwtVerifier::new(config.jwt_secret()));

    let state = Arc::new(AppState {
        config: config.clone(),
        storages,
        authorizer,
        dispatcher,
        verifier,
    });

    let router = routes::setup_routes(&config, state.clone())?;

    Ok((state, router))
}
