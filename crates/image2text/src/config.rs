use std::path::PathBuf;

use image2text_vlm::{BackendIdentity, ModelId};

/// Environment variable overriding the output directory.
pub const OUTPUT_DIR_ENV: &str = "OUTPUT_DIR";

/// Environment variable overriding the default model identifier.
pub const MODEL_ENV: &str = "I2T_MODEL";

/// The model used when neither the environment nor the caller picks one.
pub const DEFAULT_MODEL_ID: &str = "google/paligemma-3b-mix-224";

/// Configuration resolved once at startup and handed to the service and persister.
#[derive(Clone, Debug, PartialEq)]
pub struct AppConfig {
    /// The model serving requests that do not name one.
    pub default_model: ModelId,
    /// An explicitly configured output directory.
    pub output_dir: Option<PathBuf>,
    /// The application relative output directory used without an explicit one.
    pub default_output_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_model: ModelId::from(DEFAULT_MODEL_ID),
            output_dir: None,
            default_output_dir: PathBuf::from("data"),
        }
    }
}

impl AppConfig {
    /// Read [`OUTPUT_DIR_ENV`] and [`MODEL_ENV`] from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary variable lookup. Empty values are
    /// treated as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let mut config = Self::default();
        if let Some(model) = var(MODEL_ENV) {
            config.default_model = ModelId::from(model.trim());
        }
        config.output_dir = var(OUTPUT_DIR_ENV).map(PathBuf::from);
        config
    }

    /// Override the default model.
    pub fn with_default_model(mut self, model: impl Into<ModelId>) -> Self {
        self.default_model = model.into();
        self
    }

    /// Override the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }

    /// The default model with no forced device or precision.
    pub fn default_identity(&self) -> BackendIdentity {
        BackendIdentity::new(self.default_model.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::HashMap, path::PathBuf};

    use super::{AppConfig, DEFAULT_MODEL_ID, MODEL_ENV, OUTPUT_DIR_ENV};

    #[test]
    fn defaults_without_environment() {
        let config = AppConfig::from_lookup(|_| None);
        assert_eq!(config.default_model.as_str(), DEFAULT_MODEL_ID);
        assert_eq!(config.output_dir, None);
        assert_eq!(config.default_output_dir, PathBuf::from("data"));
        assert_eq!(config.default_identity().device(), None);
        assert_eq!(config.default_identity().precision(), None);
    }

    #[test]
    fn environment_overrides() {
        let env: HashMap<&str, &str> = [
            (MODEL_ENV, "google/paligemma-3b-mix-448"),
            (OUTPUT_DIR_ENV, "/srv/out"),
        ]
        .into_iter()
        .collect();
        let config = AppConfig::from_lookup(|key| env.get(key).map(|v| v.to_string()));
        assert_eq!(config.default_model.as_str(), "google/paligemma-3b-mix-448");
        assert_eq!(config.output_dir, Some(PathBuf::from("/srv/out")));
    }

    #[test]
    fn empty_values_are_unset() {
        let config = AppConfig::from_lookup(|_| Some("  ".to_string()));
        assert_eq!(config, AppConfig::default());
    }
}
