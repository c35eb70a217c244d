use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the tutorag backend
#[derive(Error, Debug)]
pub enum TutorError {
    /// Configuration related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: PathBuf },

    /// Invalid configuration value
    #[error("Invalid configuration value at {path}: {message}")]
    InvalidConfigValue { path: String, message: String },

    /// Document loading / format errors
    #[error(transparent)]
    Document(#[from] crate::document::DocumentError),

    /// Chunking errors
    #[error(transparent)]
    Chunking(#[from] crate::chunking::ChunkError),

    /// Embedding provider errors
    #[error(transparent)]
    Embedding(#[from] crate::embedding::EmbeddingError),

    /// Vector index errors
    #[error(transparent)]
    Index(#[from] crate::index::IndexError),

    /// Generation provider errors
    #[error(transparent)]
    Generation(#[from] crate::generate::GenerationError),

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

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type for tutorag operations
pub type Result<T> = std::result::Result<T, TutorError>;
