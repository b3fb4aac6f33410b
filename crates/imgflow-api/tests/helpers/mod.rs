//! Test helpers: build the router over in-memory stores.

pub mod auth;
pub mod fixtures;

use std::collections::HashMap;
use std::sync::Arc;

use axum_test::TestServer;
use imgflow_api::setup::build_app;
use imgflow_core::Config;
use imgflow_storage::{MemoryStorage, StoragePair};

pub const TEST_JWT_SECRET: &str = "test-jwt-secret-at-least-32-characters-long";
pub const TEST_WEBHOOK_TOKEN: &str = "test-webhook-token-0123";

/// API path prefix for tests (e.g. `/api/v0`).
pub fn api_path(path: &str) -> String {
    format!("{}{}", imgflow_api::constants::API_PREFIX, path)
}

pub struct TestApp {
    pub server: TestServer,
    pub origin: Arc<MemoryStorage>,
    pub derived: Arc<MemoryStorage>,
}

impl TestApp {
    pub fn client(&self) -> &TestServer {
        &self.server
    }
}

fn base_vars() -> HashMap<&'static str, String> {
    HashMap::from([
        ("JWT_SECRET", TEST_JWT_SECRET.to_string()),
        ("EVENT_WEBHOOK_TOKEN", TEST_WEBHOOK_TOKEN.to_string()),
        ("ORIGIN_BUCKET", "origin".to_string()),
        ("DERIVED_BUCKET", "derived".to_string()),
        ("STORAGE_BACKEND", "memory".to_string()),
    ])
}

pub fn setup_test_app() -> TestApp {
    setup_test_app_with(&[])
}

/// Build an app with extra configuration variables layered over the defaults.
pub fn setup_test_app_with(overrides: &[(&'static str, &str)]) -> TestApp {
    let mut vars = base_vars();
    for (key, value) in overrides {
        vars.insert(*key, value.to_string());
    }
    let config = Config::from_lookup(|key| vars.get(key).cloned()).expect("test config");

    let origin = Arc::new(MemoryStorage::new("origin"));
    let derived = Arc::new(MemoryStorage::new("derived").with_base_url("https://cdn.test"));
    let storages = StoragePair {
        origin: origin.clone(),
        derived: derived.clone(),
    };

    let (_state, router) = build_app(config, storages).expect("build app");
    let server = TestServer::new(router).expect("test server");

    TestApp {
        server,
        origin,
        derived,
    }
}
