//! imgflow API library
//!
//! HTTP handlers, auth middleware and application setup for upload grants and object-created
//! notifications.

pub mod auth;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod services;
pub mod setup;
pub mod state;
pub mod telemetry;

pub use error::{ErrorResponse, HttpAppError};
