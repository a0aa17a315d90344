use crate::error::VlmError;

/// Default cap on generated tokens.
pub const DEFAULT_MAX_NEW_TOKENS: usize = 256;

/// Default sampling temperature.
pub const DEFAULT_TEMPERATURE: f64 = 0.2;

/// How much text to generate and how randomly.
///
/// A temperature of zero selects greedy (deterministic) decoding, any positive
/// temperature selects stochastic sampling at that temperature. There is no upper
/// bound on either value, backends may impose their own.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SamplingParameters {
    max_new_tokens: usize,
    temperature: f64,
}

impl Default for SamplingParameters {
    fn default() -> Self {
        Self {
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

impl SamplingParameters {
    /// Create validated sampling parameters.
    ///
    /// # Errors
    ///
    /// `max_new_tokens` must be positive and `temperature` a finite, non negative number.
    pub fn new(max_new_tokens: usize, temperature: f64) -> Result<Self, VlmError> {
        if max_new_tokens == 0 {
            return Err(VlmError::InvalidSamplingParameters(
                "max_new_tokens must be positive".to_string(),
            ));
        }
        if !temperature.is_finite() || temperature < 0.0 {
            return Err(VlmError::InvalidSamplingParameters(format!(
                "temperature must be a finite number >= 0, got {temperature}"
            )));
        }
        Ok(Self {
            max_new_tokens,
            temperature,
        })
    }

    /// Greedy decoding capped at `max_new_tokens`.
    pub fn greedy(max_new_tokens: usize) -> Result<Self, VlmError> {
        Self::new(max_new_tokens, 0.0)
    }

    /// The maximum number of generated tokens.
    #[inline]
    pub fn max_new_tokens(&self) -> usize {
        self.max_new_tokens
    }

    /// The sampling temperature.
    #[inline]
    pub fn temperature(&self) -> f64 {
        self.temperature
    }

    /// Whether decoding is greedy.
    #[inline]
    pub fn is_deterministic(&self) -> bool {
        self.temperature == 0.0
    }
}
