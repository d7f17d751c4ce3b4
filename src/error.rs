//! Error types for gigmatch.

use std::path::PathBuf;
use thiserror::Error;

/// Library-level error type for gigmatch operations.
#[derive(Error, Debug)]
pub enum GigmatchError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Missing credential {name}. Set it in the config file or export {env_var}.")]
    MissingCredential {
        name: &'static str,
        env_var: &'static str,
    },

    #[error("Knowledge source not found: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Malformed knowledge source {}: {reason}", path.display())]
    MalformedSource { path: PathBuf, reason: String },

    #[error("Embedding generation failed: {0}")]
    Embedding(String),

    #[error("Vector store error: {0}")]
    VectorStore(String),

    #[error("Unknown collection '{0}'. Load the knowledge base first.")]
    UnknownCollection(String),

    #[error("Model error: {0}")]
    Model(String),

    #[error("Agent error: {0}")]
    Agent(String),

    #[error("Scoring error: {0}")]
    Scoring(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("OpenAI API error: {0}")]
    OpenAI(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl GigmatchError {
    /// Whether this error comes from configuration rather than data or a query.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            GigmatchError::Config(_) | GigmatchError::MissingCredential { .. }
        )
    }

    /// Whether this error comes from reading a knowledge source.
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            GigmatchError::SourceNotFound(_) | GigmatchError::MalformedSource { .. }
        )
    }
}

/// Result type alias for gigmatch operations.
pub type Result<T> = std::result::Result<T, GigmatchError>;
