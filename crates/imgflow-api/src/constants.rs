//! API constants

/// Versioned prefix for every non-health route
pub const API_PREFIX: &str = "/api/v0";

/// Crate version reported by the health endpoint
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Upper bound for JSON request bodies (upload requests and notification batches)
pub const MAX_REQUEST_BODY_BYTES: usize = 1024 * 1024;

/// Default `RUST_LOG` directive when none is set
pub const DEFAULT_LOG_FILTER: &str = "imgflow=debug,tower_http=info";
