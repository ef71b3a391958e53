//! Embedding error types.

use thiserror::Error;

/// Errors that can occur while producing embeddings.
#[derive(Debug, Error)]
pub enum EmbeddingError {
    /// No known response shape matched. Carries a structural summary only.
    #[error(
        "Malformed embedding response (shape: {shape}); check that the provider setting matches the server and the model is an embedding model"
    )]
    MalformedEmbeddingResponse { shape: String },

    /// The provider returned a different number of vectors than texts sent
    #[error(
        "Embedding provider returned {actual} vectors for {expected} inputs; try a smaller batch size or another embedding model"
    )]
    VectorCountMismatch { expected: usize, actual: usize },

    /// Vector length differs from the expected dimension
    #[error("Dimension mismatch: expected {expected}, got {actual} (embedding model changed? rebuild the index)")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Network failure, timeout, rate limit or server error
    #[error("Embedding provider {provider} unavailable: {message}")]
    ProviderUnavailable { provider: String, message: String },

    /// The provider refused the request (bad model name, auth, ...)
    #[error("Embedding provider {provider} rejected the request (HTTP {status}): {message}")]
    ProviderRejected {
        provider: String,
        status: u16,
        message: String,
    },

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Invalid provider configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

impl EmbeddingError {
    /// Whether a retry of the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EmbeddingError::ProviderUnavailable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_hint() {
        let err = EmbeddingError::VectorCountMismatch {
            expected: 4,
            actual: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("3 vectors for 4 inputs"));
        assert!(msg.contains("batch size"));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(EmbeddingError::ProviderUnavailable {
            provider: "ollama".into(),
            message: "timeout".into()
        }
        .is_retryable());
        assert!(!EmbeddingError::MalformedEmbeddingResponse {
            shape: "string".into()
        }
        .is_retryable());
        assert!(!EmbeddingError::ProviderRejected {
            provider: "openai".into(),
            status: 401,
            message: "bad key".into()
        }
        .is_retryable());
    }
}
