#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use image2text_io as io;

#[doc(inline)]
pub use image2text_vlm as vlm;

/// Process-wide configuration resolved at startup.
pub mod config;

/// The error taxonomy of the inference pipeline.
pub mod error;

/// Writing generated text to the output directory.
pub mod persist;

/// The inference request pipeline.
pub mod service;

pub use config::AppConfig;
pub use error::{ErrorKind, Image2TextError};
pub use persist::{file_name_for, OutputDir, ResultPersister};
pub use service::{GenerationRequest, GenerationResult, InferenceService};
