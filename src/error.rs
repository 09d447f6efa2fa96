//! Error types for Hearth gateway

use thiserror::Error;

/// Result type alias for Hearth operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Hearth gateway
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// LLM completion error (unreachable, timed out, bad response)
    #[error("llm error: {0}")]
    Llm(String),

    /// Device transport error outside of a dispatch batch
    #[error("transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    /// Context source error (presence, weather, search)
    #[error("context error: {0}")]
    Context(String),

    /// Resource not found
    #[error("not found: {0}")]
    NotFound(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
