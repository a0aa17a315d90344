use crate::{
    conversation::Conversation, error::VlmError, identity::BackendIdentity,
    sampling::SamplingParameters,
};

/// A loaded multimodal model able to answer one conversation turn.
///
/// Implementations own their model, device and precision for their whole lifetime.
/// A call blocks until the full answer is available; there is no streaming and a
/// single answer is returned per call.
pub trait GenerationBackend: Send {
    /// Run the model and return its raw text output.
    ///
    /// `temperature == 0` must select greedy decoding, a positive temperature
    /// stochastic sampling at that temperature. `max_new_tokens` caps the output.
    fn generate(
        &mut self,
        conversation: &Conversation,
        params: &SamplingParameters,
    ) -> Result<String, VlmError>;

    /// Run the model and return its output without leading or trailing whitespace.
    fn run(
        &mut self,
        conversation: &Conversation,
        params: &SamplingParameters,
    ) -> Result<String, VlmError> {
        let text = self.generate(conversation, params)?;
        Ok(text.trim().to_string())
    }
}

impl<B: GenerationBackend + ?Sized> GenerationBackend for Box<B> {
    fn generate(
        &mut self,
        conversation: &Conversation,
        params: &SamplingParameters,
    ) -> Result<String, VlmError> {
        (**self).generate(conversation, params)
    }
}

/// Constructs backends for identities.
///
/// Loading is expensive (weights download and allocation) and either returns a
/// fully usable backend or an error.
pub trait BackendLoader: Send + Sync {
    /// The backend type produced by this loader.
    type Backend: GenerationBackend;

    /// Load a backend for the given identity.
    fn load(&self, identity: &BackendIdentity) -> Result<Self::Backend, VlmError>;
}
