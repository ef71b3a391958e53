//! Error types for shared RAG types and configuration.

use thiserror::Error;

/// Errors raised while loading or validating shared types.
#[derive(Debug, Error)]
pub enum RagError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid input error
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
