//! Error types for mail-triage.

/// Top-level error type for the service.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Processing error: {0}")]
    Process(#[from] ProcessError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Message source (mailbox transport) errors.
#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Source {name} connection failed: {reason}")]
    ConnectFailed { name: String, reason: String },

    #[error("Authentication failed for source {name}")]
    AuthFailed { name: String },

    #[error("Protocol error: {0}")]
    Protocol(String),

    #[error("Failed to parse message: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Document text extraction errors.
///
/// The normalizer treats both variants as "no text from this attachment"
/// and moves on to the next one.
#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("Unsupported attachment format: {media_type}")]
    UnsupportedFormat { media_type: String },

    #[error("Text extraction failed: {reason}")]
    ExtractionFailed { reason: String },
}

/// Content normalization errors.
#[derive(Debug, thiserror::Error)]
pub enum NormalizeError {
    #[error("No usable text in message body or any attachment")]
    EmptyContent,
}

/// Intent classification errors.
///
/// `MalformedResponse` and `UnknownTaxonomyValue` mean the external model
/// returned data the pipeline cannot trust; they are always surfaced, never
/// coerced into a best-guess category.
#[derive(Debug, thiserror::Error)]
pub enum ClassificationError {
    #[error("Classification service unavailable: {reason}")]
    ServiceUnavailable { reason: String },

    #[error("Malformed classifier response: {reason}")]
    MalformedResponse { reason: String },

    #[error(
        "Classifier returned value outside the taxonomy: type {request_type:?}, sub-type {sub_request_type:?}"
    )]
    UnknownTaxonomyValue {
        request_type: String,
        sub_request_type: Option<String>,
    },
}

/// Result sink errors.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("Failed to serialize routed request: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Failed to deliver routed request: {0}")]
    Delivery(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Per-message pipeline errors. Always scoped to one message: a failing
/// message is reported and the rest of the batch proceeds.
#[derive(Debug, thiserror::Error)]
pub enum ProcessError {
    #[error("Normalization failed: {0}")]
    Normalize(#[from] NormalizeError),

    #[error("Classification failed: {0}")]
    Classification(#[from] ClassificationError),

    #[error("Sink emit failed: {0}")]
    Sink(#[from] SinkError),
}

/// Result type alias for the service.
pub type Result<T> = std::result::Result<T, Error>;
