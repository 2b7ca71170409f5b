use std::path::PathBuf;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    /// Required columns absent from an uploaded table (every missing column is listed)
    #[error("Missing required columns: {}", .missing.join(", "))]
    Validation { missing: Vec<String> },

    /// Severity score outside [0.0, 10.0]
    #[error("Severity score {score} is outside the range 0.0-10.0")]
    OutOfRange { score: f64 },

    /// Zero-row table submitted for prediction
    #[error("Input table has no rows; nothing to predict")]
    EmptyInput,

    /// Category encoders or label decoders absent from the model bundle
    #[error("Encoders missing from the model bundle: {}", .keys.join(", "))]
    EncoderKey { keys: Vec<String> },

    /// Malformed tabular input
    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// Model artifact or inference errors
    #[error("Model error: {0}")]
    Model(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// IO errors
    #[error("IO error on {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Wrap an IO error with the path it happened on
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        AppError::Io {
            path: path.into(),
            source,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::OutOfRange { .. } => "OUT_OF_RANGE",
            AppError::EmptyInput => "EMPTY_INPUT",
            AppError::EncoderKey { .. } => "ENCODER_KEY_ERROR",
            AppError::Parse { .. } => "PARSE_ERROR",
            AppError::Model(_) => "MODEL_ERROR",
            AppError::Configuration(_) => "CONFIGURATION_ERROR",
            AppError::Serialization(_) => "SERIALIZATION_ERROR",
            AppError::Io { .. } => "IO_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether the caller can fix this by changing the input rather than the deployment
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            AppError::Validation { .. }
                | AppError::OutOfRange { .. }
                | AppError::EmptyInput
                | AppError::Parse { .. }
        )
    }
}

/// Conversion from serde_json::Error
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Conversion from validator::ValidationErrors
impl From<validator::ValidationErrors> for AppError {
    fn from(err: validator::ValidationErrors) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Conversion from config::ConfigError
impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration(err.to_string())
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, AppError>;
