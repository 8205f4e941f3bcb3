//! Error types for the Chroma ingestion toolkit.

use thiserror::Error;

/// Errors related to configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("INI parse error: {0}")]
    IniParseError(String),

    #[error("missing [{section}] {key} in configuration")]
    Missing { section: String, key: String },

    #[error("invalid value for [{section}] {key}: {message}")]
    Invalid {
        section: String,
        key: String,
        message: String,
    },

    #[error("path error: {0}")]
    PathError(String),
}

impl ConfigError {
    pub fn missing(section: &str, key: &str) -> Self {
        ConfigError::Missing {
            section: section.to_string(),
            key: key.to_string(),
        }
    }

    pub fn invalid(section: &str, key: &str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            section: section.to_string(),
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Errors related to embedding operations.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    #[error("embedding server request failed: {0}")]
    Upstream(String),

    #[error("unexpected embedding response: {0}")]
    Schema(String),

    #[error("no valid text provided for embedding")]
    Validation,

    #[error("some texts failed to embed: {missing} position(s) left unset")]
    IncompleteResult { missing: usize },

    #[error("embedding configuration error: {0}")]
    Configuration(String),
}

impl From<reqwest::Error> for EmbeddingError {
    fn from(e: reqwest::Error) -> Self {
        EmbeddingError::Upstream(e.to_string())
    }
}

/// Errors related to vector store operations.
#[derive(Debug, Error)]
pub enum VectorStoreError {
    #[error("vector store configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("not connected: {0}")]
    NotConnected(&'static str),

    #[error("Chroma request failed: {0}")]
    Upstream(String),

    #[error("unexpected Chroma response: {0}")]
    Schema(String),

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<reqwest::Error> for VectorStoreError {
    fn from(e: reqwest::Error) -> Self {
        VectorStoreError::Upstream(e.to_string())
    }
}

/// Errors related to loading documents from files.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParseError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("malformed row {row}: {message}")]
    MalformedRow { row: usize, message: String },

    #[error("schema error: {0}")]
    Schema(String),

    #[error("no CSV or JSON files found; templates written to {0}")]
    NoCandidates(String),

    #[error("invalid selection: {0}")]
    Selection(String),

    #[error("unsupported file type: {0}")]
    UnsupportedFile(String),
}

/// Application-level errors that wrap domain errors.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),

    #[error("embedding error: {0}")]
    Embedding(#[from] EmbeddingError),

    #[error("vector store error: {0}")]
    VectorStore(#[from] VectorStoreError),

    #[error("load error: {0}")]
    Load(#[from] LoadError),

    #[error("{0}")]
    Other(String),
}
