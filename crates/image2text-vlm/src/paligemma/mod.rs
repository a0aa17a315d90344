mod model;
mod utils;

use candle_core::{DType, Device};
use candle_nn::VarBuilder;
use candle_transformers::models::paligemma::{Config, Model};
use hf_hub::{api::sync::Api, Repo, RepoType};
use image::RgbImage;
use log::info;
use model::{TextGeneration, TextGenerationConfig};
use tokenizers::Tokenizer;

use crate::{
    backend::{BackendLoader, GenerationBackend},
    conversation::Conversation,
    error::VlmError,
    identity::{BackendIdentity, ModelId},
    sampling::SamplingParameters,
};

pub use utils::{compose_input_image, select_device, select_dtype};

/// The task prompt used when the conversation carries no text.
pub const DEFAULT_PROMPT: &str = "caption en";

/// Options shared by every PaliGemma instance created by a loader.
#[derive(Clone, Debug)]
pub struct PaligemmaConfig {
    /// Seed of the sampler, so that sampled runs are reproducible.
    pub seed: u64,
    /// Penalty applied to recently generated tokens, 1.0 disables it.
    pub repeat_penalty: f32,
    /// How many recent tokens the penalty looks at.
    pub repeat_last_n: usize,
    /// Repository revision to download.
    pub revision: String,
}

impl From<&PaligemmaConfig> for TextGenerationConfig {
    fn from(config: &PaligemmaConfig) -> Self {
        TextGenerationConfig {
            seed: config.seed,
            repeat_penalty: config.repeat_penalty,
            repeat_last_n: config.repeat_last_n,
        }
    }
}

impl Default for PaligemmaConfig {
    fn default() -> Self {
        Self {
            seed: 299792458,
            repeat_penalty: 1.1,
            repeat_last_n: 64,
            revision: "main".to_string(),
        }
    }
}

/// The input resolution of a checkpoint, read from its identifier.
pub fn input_size_for(model_id: &ModelId) -> Result<usize, VlmError> {
    let id = model_id.as_str();
    if id.contains("896") {
        Err(VlmError::UnsupportedModel(format!(
            "{id}: 896px checkpoints are not supported"
        )))
    } else if id.contains("448") {
        Ok(448)
    } else {
        Ok(224)
    }
}

/// The Paligemma model
///
/// This struct contains the Google Paligemma model for text generation from one or
/// more images and an optional text prompt.
///
/// NOTE: to run the model with Cuda, you need to pass the `--features cuda` flag to the `cargo run` command.
pub struct Paligemma {
    pipeline: TextGeneration,
    dtype: DType,
    input_size: usize,
}

impl Paligemma {
    /// Load a Paligemma checkpoint for the given identity.
    ///
    /// # Arguments
    ///
    /// * `identity` - Which checkpoint, device and precision to use.
    /// * `config` - Sampler options.
    pub fn new(identity: &BackendIdentity, config: &PaligemmaConfig) -> Result<Self, VlmError> {
        let input_size = input_size_for(identity.model())?;
        let device = select_device(identity.device())?;
        let dtype = select_dtype(identity.precision(), &device);

        info!(
            "loading {} ({input_size}px) on {device:?} as {dtype:?}",
            identity.model()
        );

        let (model, tokenizer) = Self::load_model(
            identity.model(),
            &config.revision,
            input_size,
            dtype,
            &device,
        )?;
        let pipeline = TextGeneration::new(model, tokenizer, device, config.into())?;

        Ok(Self {
            pipeline,
            dtype,
            input_size,
        })
    }

    // utility function to load the model
    fn load_model(
        model_id: &ModelId,
        revision: &str,
        input_size: usize,
        dtype: DType,
        device: &Device,
    ) -> Result<(Model, Tokenizer), VlmError> {
        let api = Api::new()?;
        let repo = api.repo(Repo::with_revision(
            model_id.to_string(),
            RepoType::Model,
            revision.to_string(),
        ));

        let tokenizer_filename = repo.get("tokenizer.json")?;
        let filenames = utils::hub_load_safetensors(&repo)?;

        let tokenizer = Tokenizer::from_file(tokenizer_filename)?;

        let config = if input_size == 448 {
            Config::paligemma_3b_448()
        } else {
            Config::paligemma_3b_224()
        };
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&filenames, dtype, device)? };

        let model = Model::new(&config, vb)?;

        Ok((model, tokenizer))
    }
}

impl GenerationBackend for Paligemma {
    fn generate(
        &mut self,
        conversation: &Conversation,
        params: &SamplingParameters,
    ) -> Result<String, VlmError> {
        let images: Vec<&RgbImage> = conversation.images().map(|img| img.as_rgb8()).collect();
        if images.is_empty() {
            return Err(VlmError::NoImage);
        }

        let input = compose_input_image(&images, self.input_size as u32);
        let image_t = utils::image_to_tensor(&input, self.pipeline.device(), self.dtype)?;

        let prompt = conversation
            .text()
            .unwrap_or_else(|| DEFAULT_PROMPT.to_string());

        self.pipeline.run(&image_t, &format!("{prompt}\n"), params)
    }
}

/// Loads [`Paligemma`] instances from the Hugging Face hub.
#[derive(Clone, Debug, Default)]
pub struct PaligemmaLoader {
    config: PaligemmaConfig,
}

impl PaligemmaLoader {
    /// A loader creating instances with the given options.
    pub fn new(config: PaligemmaConfig) -> Self {
        Self { config }
    }
}

impl BackendLoader for PaligemmaLoader {
    type Backend = Paligemma;

    fn load(&self, identity: &BackendIdentity) -> Result<Paligemma, VlmError> {
        Paligemma::new(identity, &self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::input_size_for;
    use crate::identity::ModelId;

    #[test]
    fn input_size_from_identifier() {
        assert_eq!(
            input_size_for(&ModelId::from("google/paligemma-3b-mix-224")).unwrap(),
            224
        );
        assert_eq!(
            input_size_for(&ModelId::from("google/paligemma-3b-mix-448")).unwrap(),
            448
        );
        assert_eq!(input_size_for(&ModelId::from("my/custom-model")).unwrap(), 224);
        assert!(input_size_for(&ModelId::from("google/paligemma-3b-pt-896")).is_err());
    }
}
