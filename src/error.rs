use std::path::PathBuf;
use thiserror::Error;

/// Main error type for Lexica
#[derive(Error, Debug)]
pub enum LexicaError {
    /// A query or build step needs an artifact that has not been built yet
    #[error("Artifact '{artifact}' has not been built for corpus {corpus}")]
    NotBuilt { corpus: String, artifact: String },

    /// The corpus had no ingestible messages
    #[error("Corpus contains no ingestible messages")]
    EmptyCorpus,

    /// Embedding vector length does not match the store dimension
    #[error("Embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A single corpus row could not be parsed
    #[error("Malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    /// Authority ranking was requested without a graph artifact
    #[error("Graph edges are missing; build the graph first")]
    MissingEdges,

    /// Authority ranking was requested without message metadata
    #[error("Message metadata is missing; build metadata first")]
    MissingMeta,

    /// Corpus directory does not exist
    #[error("Corpus not found: {id}")]
    CorpusNotFound { id: String },

    /// Another build holds the corpus lock
    #[error("A build is already running for corpus {corpus}")]
    BuildInProgress { corpus: String },

    /// Query could not be interpreted
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

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

    /// IO errors
    #[error("IO error: {context}: {source}")]
    Io {
        source: std::io::Error,
        context: String,
    },

    /// JSON errors
    #[error("JSON error: {context}: {source}")]
    Json {
        source: serde_json::Error,
        context: String,
    },

    /// TOML deserialization errors
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// TOML serialization errors
    #[error("TOML serialization error: {0}")]
    TomlSerialization(#[from] toml::ser::Error),

    /// Generic errors
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl LexicaError {
    pub fn not_built(corpus: impl Into<String>, artifact: impl Into<String>) -> Self {
        Self::NotBuilt {
            corpus: corpus.into(),
            artifact: artifact.into(),
        }
    }

    pub fn io(source: std::io::Error, context: impl Into<String>) -> Self {
        Self::Io {
            source,
            context: context.into(),
        }
    }

    pub fn json(source: serde_json::Error, context: impl Into<String>) -> Self {
        Self::Json {
            source,
            context: context.into(),
        }
    }
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

/// Result type for Lexica operations
pub type Result<T> = std::result::Result<T, LexicaError>;
