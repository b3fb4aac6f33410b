//! Data models for the pipeline
//!
//! Nothing here is persisted: grants are capabilities handed back to the caller, and
//! notifications and results live only for the duration of one batch.

mod artifact;
mod notification;
mod processing;
mod upload;

pub use artifact::*;
pub use notification::*;
pub use processing::*;
pub use upload::*;
