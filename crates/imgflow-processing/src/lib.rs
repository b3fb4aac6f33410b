//! imgflow processing library
//!
//! Decoding, cover-cropping and encoding of images, and the [`ImageProcessor`] that runs
//! those steps for one original and writes the results to the derived-artifact store.

pub mod compression;
pub mod decode;
pub mod processor;
pub mod resize;

pub use compression::{EncodedImage, ImageCompressor};
pub use decode::decode_upright;
pub use processor::{ImageProcessor, ProcessorConfig};
pub use resize::ImageResize;
