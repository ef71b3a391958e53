//! Error types for the indexing pipeline.

use std::path::PathBuf;

use rag_embeddings::EmbeddingError;
use rag_types::ChunkId;
use rag_vector::VectorError;
use thiserror::Error;

/// Errors that can occur while building an index
#[derive(Error, Debug)]
pub enum IndexingError {
    /// An embedding batch failed; the build was aborted
    #[error("Embedding batch {batch} ({size} chunks) failed, build aborted: {source}")]
    BatchFailed {
        batch: usize,
        size: usize,
        source: EmbeddingError,
    },

    /// Vector index error
    #[error("Vector error: {0}")]
    Vector(#[from] VectorError),

    /// Invalid chunking parameters or tokenizer failure
    #[error("Chunking error: {0}")]
    Chunking(String),

    /// Corpus could not be read
    #[error("Cannot read corpus {path}: {message}")]
    Corpus { path: PathBuf, message: String },

    /// Identifier source handed out an id twice
    #[error("Duplicate chunk identifier {0}")]
    DuplicateIdentifier(ChunkId),

    /// Another build holds the lock for this index
    #[error("Another build is running for this index (lock file {lock}); remove it if no build is running")]
    Busy { lock: PathBuf },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
