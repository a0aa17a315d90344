use std::path::PathBuf;

use image2text::{
    io::ImageSource,
    vlm::{BackendIdentity, BackendLoader, DeviceSelector, ModelId, SamplingParameters},
    GenerationRequest, GenerationResult, Image2TextError, InferenceService, ResultPersister,
};

/// Checkpoints offered by number; anything else is taken as a custom identifier.
pub const MODEL_CANDIDATES: &[&str] = &[
    "google/paligemma-3b-mix-224",
    "google/paligemma-3b-mix-448",
    "google/paligemma-3b-pt-224",
];

/// Bounds of the token budget.
pub const MIN_NEW_TOKENS: usize = 32;
/// Upper bound of the token budget.
pub const MAX_NEW_TOKENS: usize = 1024;

/// The knobs a user can turn between turns.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    model: ModelId,
    device: Option<DeviceSelector>,
    params: SamplingParameters,
}

impl Settings {
    /// Default sampling with the given model on the automatically picked device.
    pub fn new(model: impl Into<ModelId>) -> Self {
        Self {
            model: model.into(),
            device: None,
            params: SamplingParameters::default(),
        }
    }

    pub fn model(&self) -> &ModelId {
        &self.model
    }

    pub fn device(&self) -> Option<DeviceSelector> {
        self.device
    }

    pub fn max_new_tokens(&self) -> usize {
        self.params.max_new_tokens()
    }

    pub fn temperature(&self) -> f64 {
        self.params.temperature()
    }

    pub fn params(&self) -> SamplingParameters {
        self.params
    }

    /// Select a model, either by its 1-based position in [`MODEL_CANDIDATES`] or by
    /// identifier.
    pub fn set_model(&mut self, choice: &str) -> Result<(), String> {
        let choice = choice.trim();
        if choice.is_empty() {
            return Err("expected a model number or identifier".to_string());
        }
        self.model = match choice.parse::<usize>() {
            Ok(n) if (1..=MODEL_CANDIDATES.len()).contains(&n) => MODEL_CANDIDATES[n - 1].into(),
            Ok(n) => return Err(format!("no model number {n}")),
            Err(_) => choice.into(),
        };
        Ok(())
    }

    /// Set the device preference, `auto` lets the backend choose.
    pub fn set_device(&mut self, preference: &str) -> Result<(), String> {
        let device = DeviceSelector::parse_preference(preference);
        self.device = device.map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Set the token budget, clamped to `MIN_NEW_TOKENS..=MAX_NEW_TOKENS`.
    pub fn set_max_new_tokens(&mut self, value: usize) -> Result<(), String> {
        let max_new_tokens = value.clamp(MIN_NEW_TOKENS, MAX_NEW_TOKENS);
        self.update(max_new_tokens, self.temperature())
    }

    /// Set the temperature, clamped to `0.0..=1.0`. NaN is rejected.
    pub fn set_temperature(&mut self, value: f64) -> Result<(), String> {
        self.update(self.max_new_tokens(), value.clamp(0.0, 1.0))
    }

    fn update(&mut self, max_new_tokens: usize, temperature: f64) -> Result<(), String> {
        let params = SamplingParameters::new(max_new_tokens, temperature);
        self.params = params.map_err(|e| e.to_string())?;
        Ok(())
    }

    pub fn identity(&self) -> BackendIdentity {
        BackendIdentity::new(self.model.clone()).with_device(self.device)
    }

}

impl std::fmt::Display for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "model: {}, device: {}, max_new_tokens: {}, temperature: {:.2}",
            self.model,
            self.device
                .map(|d| d.to_string())
                .unwrap_or_else(|| "auto".to_string()),
            self.max_new_tokens(),
            self.temperature()
        )
    }
}

/// One line of interactive input.
#[derive(Debug, PartialEq)]
pub enum Command {
    /// Queue an image for the next turn.
    Image(PathBuf),
    /// Forget the queued images.
    Clear,
    /// Pick a model by number or identifier.
    Model(String),
    /// Set the device preference.
    Device(String),
    /// Set the token budget.
    Tokens(usize),
    /// Set the temperature.
    Temperature(f64),
    /// Print the current settings.
    Settings,
    /// Print the command list.
    Help,
    /// Leave the session.
    Quit,
    /// Describe the queued images, with an optional prompt.
    Describe(Option<String>),
}

impl Command {
    /// Parse a line. Lines not starting with `:` are prompts, an empty line asks
    /// for the default prompt.
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let Some(rest) = line.strip_prefix(':') else {
            let prompt = Some(line.to_string()).filter(|p| !p.is_empty());
            return Ok(Command::Describe(prompt));
        };

        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest, ""),
        };
        let require = |what: &str| {
            if arg.is_empty() {
                Err(format!(":{name} expects {what}"))
            } else {
                Ok(arg.to_string())
            }
        };

        match name {
            "image" | "i" => Ok(Command::Image(PathBuf::from(require("a path")?))),
            "clear" => Ok(Command::Clear),
            "model" => Ok(Command::Model(require("a model number or identifier")?)),
            "device" => Ok(Command::Device(require("auto, cuda or cpu")?)),
            "tokens" => require("a number")?
                .parse()
                .map(Command::Tokens)
                .map_err(|_| format!("not a token count: {arg}")),
            "temp" | "temperature" => require("a number")?
                .parse()
                .map(Command::Temperature)
                .map_err(|_| format!("not a temperature: {arg}")),
            "settings" => Ok(Command::Settings),
            "help" | "h" => Ok(Command::Help),
            "quit" | "q" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command :{other}, try :help")),
        }
    }
}

/// Usage shown by `:help`.
pub const HELP: &str = "\
:image PATH     queue an image (repeat for several)
:clear          forget the queued images
:model N|ID     pick a listed model by number or give an identifier
:device D       auto, cuda or cpu
:tokens N       max new tokens (32..=1024)
:temp T         temperature (0.0..=1.0)
:settings       show the current settings
:quit           leave
anything else   describe the queued images with that prompt";

/// The state carried across turns: the pipeline, the queued images and the
/// current settings.
pub struct Session<L: BackendLoader> {
    service: InferenceService<L>,
    persister: ResultPersister,
    pub settings: Settings,
    images: Vec<PathBuf>,
}

impl<L: BackendLoader> Session<L> {
    pub fn new(
        service: InferenceService<L>,
        persister: ResultPersister,
        settings: Settings,
    ) -> Self {
        Self {
            service,
            persister,
            settings,
            images: Vec::new(),
        }
    }

    pub fn images(&self) -> &[PathBuf] {
        &self.images
    }

    pub fn queue_image(&mut self, path: impl Into<PathBuf>) {
        self.images.push(path.into());
    }

    pub fn clear_images(&mut self) {
        self.images.clear();
    }

    /// Describe the queued images with the current settings and persist the text.
    ///
    /// The queue is kept, so the same images can be asked about again.
    pub fn describe(&self, prompt: Option<String>) -> Result<GenerationResult, Image2TextError> {
        let request = GenerationRequest::new(self.images.iter().map(ImageSource::path))
            .with_prompt(prompt)
            .with_identity(self.settings.identity())
            .with_params(self.settings.params());

        let result = self.service.generate(request)?;
        let path = self.persister.save(result.text(), result.name_hint())?;
        Ok(result.with_persisted_path(path))
    }
}
