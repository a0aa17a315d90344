use std::path::PathBuf;

use image2text_io::InvalidImage;
use image2text_vlm::{BackendIdentity, VlmError};

/// The kind of an [`Image2TextError`], for mapping to user facing statuses.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// An input could not be decoded.
    InvalidImage,
    /// No input was supplied.
    EmptyInput,
    /// The model could not be prepared.
    BackendUnavailable,
    /// The model failed while generating.
    GenerationFailed,
    /// The output could not be written.
    PersistenceFailed,
}

/// An error type for the inference pipeline.
///
/// Every failure reaches the caller with the offending input or the underlying cause
/// attached; nothing is retried.
#[derive(thiserror::Error, Debug)]
pub enum Image2TextError {
    /// An input could not be decoded as an image.
    #[error(transparent)]
    InvalidImage(#[from] InvalidImage),

    /// The request contained no image.
    #[error("Upload one or more images.")]
    EmptyInput,

    /// The backend for an identity could not be constructed.
    #[error("Backend {identity} is unavailable. {source}")]
    BackendUnavailable {
        /// The identity that failed to load.
        identity: BackendIdentity,
        /// Why loading failed.
        #[source]
        source: VlmError,
    },

    /// The backend failed while generating.
    #[error("Generation failed. {0}")]
    GenerationFailed(#[source] VlmError),

    /// The generated text could not be written.
    #[error("Failed to write {}. {source}", .path.display())]
    PersistenceFailed {
        /// The file that could not be written.
        path: PathBuf,
        /// The underlying I/O failure.
        #[source]
        source: std::io::Error,
    },
}

impl Image2TextError {
    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Image2TextError::InvalidImage(_) => ErrorKind::InvalidImage,
            Image2TextError::EmptyInput => ErrorKind::EmptyInput,
            Image2TextError::BackendUnavailable { .. } => ErrorKind::BackendUnavailable,
            Image2TextError::GenerationFailed(_) => ErrorKind::GenerationFailed,
            Image2TextError::PersistenceFailed { .. } => ErrorKind::PersistenceFailed,
        }
    }

    /// The identifier of the rejected input, for [`ErrorKind::InvalidImage`].
    pub fn offending_input(&self) -> Option<&str> {
        match self {
            Image2TextError::InvalidImage(e) => e.name.as_deref(),
            _ => None,
        }
    }
}
