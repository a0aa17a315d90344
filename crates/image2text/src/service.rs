use std::{path::PathBuf, time::Instant};

use image2text_io::{normalize, ImageSource, NormalizedImage};
use image2text_vlm::{
    BackendCache, BackendIdentity, BackendLoader, Conversation, GenerationBackend,
    SamplingParameters, VlmError,
};
use log::{debug, info};

use crate::{config::AppConfig, error::Image2TextError, persist::file_name_for};

/// A request to describe one or more images.
///
/// Omitted fields take the service defaults: the configured default model with no
/// forced device or precision, and [`SamplingParameters::default`].
#[derive(Debug)]
pub struct GenerationRequest {
    sources: Vec<ImageSource>,
    prompt: Option<String>,
    identity: Option<BackendIdentity>,
    params: Option<SamplingParameters>,
}

impl GenerationRequest {
    /// A request for the given images, in order.
    pub fn new(sources: impl IntoIterator<Item = ImageSource>) -> Self {
        Self {
            sources: sources.into_iter().collect(),
            prompt: None,
            identity: None,
            params: None,
        }
    }

    /// Ask a question or give an instruction about the images.
    pub fn with_prompt(mut self, prompt: Option<String>) -> Self {
        self.prompt = prompt;
        self
    }

    /// Serve the request with a specific backend identity.
    pub fn with_identity(mut self, identity: BackendIdentity) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Use explicit sampling parameters.
    pub fn with_params(mut self, params: SamplingParameters) -> Self {
        self.params = Some(params);
        self
    }

    /// The identifier of the first input, used to name the output.
    pub fn name_hint(&self) -> Option<String> {
        self.sources.first().and_then(ImageSource::name)
    }
}

/// The outcome of a successful request.
#[derive(Clone, Debug, PartialEq)]
pub struct GenerationResult {
    text: String,
    name_hint: Option<String>,
    identity: BackendIdentity,
    persisted_path: Option<PathBuf>,
}

impl GenerationResult {
    /// The generated text, without surrounding whitespace.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// The identifier of the first input image.
    pub fn name_hint(&self) -> Option<&str> {
        self.name_hint.as_deref()
    }

    /// The identity of the backend that produced the text.
    pub fn identity(&self) -> &BackendIdentity {
        &self.identity
    }

    /// Where the text was written, once persisted.
    pub fn persisted_path(&self) -> Option<&std::path::Path> {
        self.persisted_path.as_deref()
    }

    /// The file name the text is persisted under, e.g. for a download.
    pub fn file_name(&self) -> String {
        file_name_for(self.name_hint())
    }

    /// The same result, recorded as persisted at `path`.
    pub fn with_persisted_path(self, path: PathBuf) -> Self {
        Self {
            persisted_path: Some(path),
            ..self
        }
    }

    /// Take the text.
    pub fn into_text(self) -> String {
        self.text
    }
}

/// Turns raw images and a prompt into text.
///
/// Backends are kept in a [`BackendCache`], one per identity, and reused across
/// requests. `generate` blocks for the whole model invocation.
pub struct InferenceService<L: BackendLoader> {
    config: AppConfig,
    backends: BackendCache<L>,
}

impl<L: BackendLoader> InferenceService<L> {
    /// A service with an empty backend cache.
    pub fn new(config: AppConfig, loader: L) -> Self {
        Self {
            config,
            backends: BackendCache::new(loader),
        }
    }

    /// The configuration the service was created with.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// The configured default model with no forced device or precision.
    pub fn default_identity(&self) -> BackendIdentity {
        self.config.default_identity()
    }

    /// The loaded backends.
    pub fn backends(&self) -> &BackendCache<L> {
        &self.backends
    }

    /// Discard the backend for `identity`, e.g. after a timed out generation left it
    /// in an unknown state.
    pub fn evict(&self, identity: &BackendIdentity) -> bool {
        self.backends.evict(identity)
    }

    /// Run the full pipeline for one request.
    ///
    /// The request fails as a whole: an empty image list is rejected before any
    /// backend is touched, and the first image that fails to decode aborts the
    /// request before the model runs.
    pub fn generate(
        &self,
        request: GenerationRequest,
    ) -> Result<GenerationResult, Image2TextError> {
        if request.sources.is_empty() {
            return Err(Image2TextError::EmptyInput);
        }

        let name_hint = request.name_hint();
        let GenerationRequest {
            sources,
            prompt,
            identity,
            params,
        } = request;

        let images = sources
            .into_iter()
            .map(normalize)
            .collect::<Result<Vec<NormalizedImage>, _>>()?;
        debug!("normalized {} image(s)", images.len());

        let conversation = Conversation::build(images, prompt.as_deref());
        let identity = identity.unwrap_or_else(|| self.default_identity());
        let params = params.unwrap_or_default();

        let text = self.run(&identity, &conversation, &params)?;

        Ok(GenerationResult {
            text,
            name_hint,
            identity,
            persisted_path: None,
        })
    }

    fn run(
        &self,
        identity: &BackendIdentity,
        conversation: &Conversation,
        params: &SamplingParameters,
    ) -> Result<String, Image2TextError> {
        let shared = self
            .backends
            .get_or_load(identity)
            .map_err(|source| Image2TextError::BackendUnavailable {
                identity: identity.clone(),
                source,
            })?;

        let mut backend = match shared.lock() {
            Ok(guard) => guard,
            Err(_) => {
                // a panic mid generation leaves the model state unknown
                self.backends.evict_if_same(identity, &shared);
                return Err(Image2TextError::GenerationFailed(VlmError::Poisoned));
            }
        };

        let start = Instant::now();
        let text = backend
            .run(conversation, params)
            .map_err(Image2TextError::GenerationFailed)?;
        info!(
            "{identity} answered {} part(s) in {:.2?} ({} chars)",
            conversation.len(),
            start.elapsed(),
            text.len()
        );

        Ok(text)
    }
}
