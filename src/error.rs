use std::path::PathBuf;
use thiserror::Error;

use crate::embedding::EmbeddingError;
use crate::retrieval::SearchError;
use crate::store::StoreError;

/// Main error type for the shaikh crate
#[derive(Error, Debug)]
pub enum ShaikhError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration validation errors
    #[error("Configuration validation failed: {errors:?}")]
    ConfigValidation { errors: Vec<ValidationError> },

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Corpus records that cannot be indexed
    #[error("Corpus error at line {line}: {message}")]
    Corpus { line: usize, message: String },

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// Hybrid search failures
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Embedding provider failures outside of a search call
    #[error("Embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    /// Vector store or keyword index failures outside of a search call
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Path to the configuration key that failed validation
    pub path: String,
    /// Error message describing the validation failure
    pub message: String,
}

impl ValidationError {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

/// Result type for shaikh operations
pub type Result<T> = std::result::Result<T, ShaikhError>;
