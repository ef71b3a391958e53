//! Vector index error types.

use std::path::PathBuf;

use rag_types::DistanceMetric;
use thiserror::Error;

/// Errors that can occur during vector index operations.
#[derive(Debug, Error)]
pub enum VectorError {
    /// The persisted index cannot be opened or queried
    #[error("Index unavailable at {path}: {message}")]
    IndexUnavailable { path: PathBuf, message: String },

    /// usearch index error
    #[error("Index error: {0}")]
    Index(String),

    /// Vector length differs from the index dimension
    #[error("Dimension mismatch: expected {expected}, got {actual} (embedding model changed? rebuild the index)")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Index was built with another metric
    #[error("Index at {path} uses the {stored} metric but {requested} was requested; rebuild the index or change `metric`")]
    MetricMismatch {
        path: PathBuf,
        stored: DistanceMetric,
        requested: DistanceMetric,
    },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// RocksDB error
    #[error("Database error: {0}")]
    Database(#[from] rocksdb::Error),
}

impl VectorError {
    pub(crate) fn unavailable(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        VectorError::IndexUnavailable {
            path: path.into(),
            message: message.into(),
        }
    }
}
