//! # image2text Vision-Language Models (VLM)
//!
//! The contract between the inference pipeline and a multimodal generation model.
//!
//! - [`conversation`]: the single user turn, text first then images in input order.
//! - [`identity`]: which model, on which device, in which precision.
//! - [`sampling`]: generation length and temperature.
//! - [`backend`]: the [`GenerationBackend`] and [`BackendLoader`] traits.
//! - [`cache`]: one backend instance per identity, one generation at a time per instance.
//!
//! With the `candle` feature (enabled by default) the [`paligemma`] module provides a
//! backend running Google's PaliGemma with candle, loading weights from the Hugging Face hub.
//! Use the `cuda` or `metal` features to enable the accelerators.

/// Generation backend traits.
pub mod backend;

/// Backend instance cache keyed by identity.
pub mod cache;

/// Multimodal conversation assembly.
pub mod conversation;

/// Error types for the VLM crate.
pub mod error;

/// Model, device and precision selection.
pub mod identity;

/// Sampling parameters.
pub mod sampling;

/// PaliGemma vision-language model integration.
///
/// Google's PaliGemma model for image captioning and visual question answering.
#[cfg(feature = "candle")]
pub mod paligemma;

pub use backend::{BackendLoader, GenerationBackend};
pub use cache::BackendCache;
pub use conversation::{ContentPart, Conversation, ConversationBuilder, Role};
pub use error::VlmError;
pub use identity::{BackendIdentity, DeviceSelector, ModelId, Precision};
pub use sampling::SamplingParameters;
