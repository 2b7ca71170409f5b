use crate::error::Result;
use crate::ml::schema::SchemaVariant;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use validator::Validate;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model artifact locations
    #[serde(default)]
    pub models: ModelsConfig,

    /// Input schema configuration
    #[serde(default)]
    pub schema: SchemaConfig,

    /// Prediction configuration
    #[serde(default)]
    pub prediction: PredictionConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the built-in defaults, an optional file and the environment.
    ///
    /// When `path` is `None`, `PREDICT_ATTACK_CONFIG` is consulted, then
    /// `config/predict-attack.toml`. The file is optional in both cases.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p.to_string_lossy().into_owned(),
            None => std::env::var("PREDICT_ATTACK_CONFIG")
                .unwrap_or_else(|_| "config/predict-attack.toml".to_string()),
        };

        let config: Config = config::Config::builder()
            // Start with default values
            .add_source(config::File::from_str(
                include_str!("../config/default.toml"),
                config::FileFormat::Toml,
            ))
            // Override with config file if it exists
            .add_source(config::File::with_name(&config_path).required(path.is_some()))
            // Override with environment variables (prefix: PREDICT_ATTACK__)
            .add_source(
                config::Environment::with_prefix("PREDICT_ATTACK")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        config.prediction.validate()?;
        Ok(config)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Directory holding the model artifacts
    #[serde(default = "default_models_dir")]
    pub dir: PathBuf,

    /// Tree-ensemble file name, relative to `dir`
    #[serde(default = "default_model_file")]
    pub model_file: String,

    /// Encoder bundle file name, relative to `dir`
    #[serde(default = "default_encoders_file")]
    pub encoders_file: String,

    /// Feature-column list file name, relative to `dir`
    #[serde(default = "default_feature_columns_file")]
    pub feature_columns_file: String,
}

impl ModelsConfig {
    pub fn model_path(&self) -> PathBuf {
        self.dir.join(&self.model_file)
    }

    pub fn encoders_path(&self) -> PathBuf {
        self.dir.join(&self.encoders_file)
    }

    pub fn feature_columns_path(&self) -> PathBuf {
        self.dir.join(&self.feature_columns_file)
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            dir: default_models_dir(),
            model_file: default_model_file(),
            encoders_file: default_encoders_file(),
            feature_columns_file: default_feature_columns_file(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SchemaConfig {
    /// Which required-column set uploaded tables must satisfy
    #[serde(default)]
    pub variant: SchemaVariant,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct PredictionConfig {
    /// Number of ranked attack types to report
    #[validate(range(min = 1, max = 100))]
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for PredictionConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default)]
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
        }
    }
}

// Default value functions
fn default_models_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_model_file() -> String {
    "model.json".to_string()
}

fn default_encoders_file() -> String {
    "encoders.json".to_string()
}

fn default_feature_columns_file() -> String {
    "feature_columns.json".to_string()
}

fn default_top_k() -> usize {
    5
}

fn default_log_level() -> String {
    "info".to_string()
}
