//! Error types for trustgraph.

use thiserror::Error;

/// Result type alias for trustgraph operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in trustgraph operations.
#[derive(Error, Debug)]
pub enum Error {
    // Model errors
    #[error("Model load failed: {0}")]
    ModelLoad(String),

    #[error("Training failed: {0}")]
    Training(String),

    // Input errors
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Node {0} has no feature row")]
    MissingFeatureRow(String),

    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether the error means no usable model checkpoint was available.
    pub fn is_model_load(&self) -> bool {
        matches!(self, Error::ModelLoad(_))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for Error {
    fn from(err: bincode::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<csv::Error> for Error {
    fn from(err: csv::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}
