#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Error types for image decoding.
///
/// Defines [`IoError`](error::IoError) for low level decoding failures and
/// [`InvalidImage`](error::InvalidImage) which attaches the offending input's identifier.
pub mod error;

/// High-level image normalization functions.
///
/// See [`functional::normalize`] for the entry point used by the inference pipeline.
pub mod functional;

/// The canonical in-memory RGB8 image.
pub mod image;

/// Raw image inputs accepted by the normalizer.
pub mod source;

pub use error::{InvalidImage, IoError};
pub use functional::normalize;
pub use image::{ImageSize, NormalizedImage};
pub use source::ImageSource;
