//! Retrieval error types.

use rag_embeddings::EmbeddingError;
use rag_vector::VectorError;
use thiserror::Error;

/// Errors raised while answering a query's retrieval step.
#[derive(Debug, Error)]
pub enum RetrievalError {
    /// The question could not be embedded
    #[error("Failed to embed the question: {0}")]
    Embedding(#[from] EmbeddingError),

    /// The index could not be opened or searched
    #[error(transparent)]
    Vector(#[from] VectorError),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
