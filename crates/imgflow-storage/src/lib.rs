//! imgflow storage library
//!
//! This crate provides the storage abstraction and its S3, local filesystem and in-memory
//! implementations, plus the two pipeline pieces that sit directly on top of it:
//! [`StreamBuffer`] for size-bounded reads of originals and [`ArtifactWriter`] for writes
//! of derived artifacts.
//!
//! Keys must not contain `..` or a leading `/`; every backend enforces this through the
//! `keys` module.

pub mod buffer;
pub mod factory;
pub(crate) mod keys;
#[cfg(feature = "storage-local")]
pub mod local;
pub mod memory;
#[cfg(feature = "storage-s3")]
pub mod s3;
pub mod traits;
pub mod writer;

// Re-export commonly used types
pub use buffer::StreamBuffer;
pub use factory::{create_storage, create_storages, StoragePair};
pub use imgflow_core::StorageBackend;
#[cfg(feature = "storage-local")]
pub use local::LocalStorage;
pub use memory::{MemoryStorage, StoredObject};
#[cfg(feature = "storage-s3")]
pub use s3::S3Storage;
pub use traits::{ByteStream, Storage, StorageError, StorageResult};
pub use writer::ArtifactWriter;
