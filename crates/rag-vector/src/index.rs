//! Vector store trait and types.
//!
//! The store boundary is deliberately small: upsert a record, query the
//! nearest records, and (in [`crate::lifecycle`]) drop a whole index.

use chrono::{DateTime, Utc};
use rag_types::{ChunkId, ChunkMetadata, ChunkRecord, DistanceMetric};
use serde::Serialize;

use crate::error::VectorError;

/// One hit from a nearest-neighbour query.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighbor {
    pub id: ChunkId,
    /// Raw distance under the store's metric (lower is closer)
    pub distance: f32,
    pub text: String,
    pub metadata: ChunkMetadata,
}

/// Index statistics
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    /// Number of chunk records
    pub record_count: usize,
    /// Vector length, unknown until the first record is written
    pub dimension: Option<usize>,
    pub metric: DistanceMetric,
    /// Embedding model the index was built with
    pub embedding_model: String,
    /// Bytes on disk (0 for in-memory stores)
    pub size_bytes: u64,
    pub created_at: DateTime<Utc>,
}

/// Trait for vector stores.
///
/// Writes take `&mut self`: a store has exactly one writer. Queries take
/// `&self` and never observe a half-written record.
pub trait VectorStore: Send + Sync {
    /// Metric all distances are reported in
    fn metric(&self) -> DistanceMetric;

    /// Vector length, if any record has been written
    fn dimension(&self) -> Option<usize>;

    /// Number of records
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Insert a record, replacing any record with the same id.
    fn upsert(&mut self, record: ChunkRecord) -> Result<(), VectorError>;

    /// Insert several records in order.
    fn upsert_batch(&mut self, records: Vec<ChunkRecord>) -> Result<(), VectorError> {
        for record in records {
            self.upsert(record)?;
        }
        Ok(())
    }

    /// Up to `k` records closest to `vector`, closest first.
    ///
    /// An empty store yields an empty list.
    fn nearest(&self, vector: &[f32], k: usize) -> Result<Vec<Neighbor>, VectorError>;

    /// Every stored record, in no particular order.
    fn records(&self) -> Result<Vec<ChunkRecord>, VectorError>;

    fn stats(&self) -> IndexStats;

    /// Persist pending writes. No-op for in-memory stores.
    fn flush(&mut self) -> Result<(), VectorError> {
        Ok(())
    }
}

/// Check a vector against the store dimension.
pub(crate) fn check_dimension(expected: Option<usize>, actual: usize) -> Result<(), VectorError> {
    match expected {
        Some(expected) if expected != actual => {
            Err(VectorError::DimensionMismatch { expected, actual })
        }
        _ => Ok(()),
    }
}
