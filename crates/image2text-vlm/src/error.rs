/// An error type for the vlm crate.
#[derive(thiserror::Error, Debug)]
pub enum VlmError {
    /// The sampling parameters are outside of their domain.
    #[error("Invalid sampling parameters: {0}")]
    InvalidSamplingParameters(String),

    /// The device selector could not be parsed.
    #[error("Invalid device selector: {0}")]
    InvalidDevice(String),

    /// The precision selector could not be parsed.
    #[error("Invalid precision: {0}")]
    InvalidPrecision(String),

    /// The requested device cannot be used.
    #[error("Device {device} is unavailable. {reason}")]
    DeviceUnavailable {
        /// The requested device.
        device: String,
        /// Why it could not be opened.
        reason: String,
    },

    /// The model identifier does not resolve to a model this backend can run.
    #[error("Unsupported model: {0}")]
    UnsupportedModel(String),

    /// The conversation holds no image.
    #[error("The conversation does not contain any image")]
    NoImage,

    /// A previous generation panicked while holding the backend.
    #[error("The backend instance is poisoned by a previous failure")]
    Poisoned,

    /// A failure reported by a backend that has no dedicated variant.
    #[error("{0}")]
    Backend(String),

    /// File access failed.
    #[error(transparent)]
    IoError(#[from] std::io::Error),

    /// Error to download the model files.
    #[cfg(feature = "candle")]
    #[error(transparent)]
    FailedToLoadModel(#[from] hf_hub::api::sync::ApiError),

    /// Error raised by the tensor runtime.
    #[cfg(feature = "candle")]
    #[error(transparent)]
    CandleError(#[from] candle_core::Error),

    /// Error raised by the tokenizer.
    #[cfg(feature = "candle")]
    #[error(transparent)]
    TokenizerError(#[from] tokenizers::Error),

    /// The weight index of the model repository is malformed.
    #[cfg(feature = "candle")]
    #[error("Invalid weight index: {0}")]
    InvalidWeightIndex(String),

    /// The tokenizer lacks the end of sequence token.
    #[error("Cannot find the <eos> token")]
    EosTokenNotFound,
}
