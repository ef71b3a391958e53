//! # rag-vector
//!
//! Vector index for the grounded RAG pipeline.
//!
//! The index stores one [`rag_types::ChunkRecord`] per chunk and answers
//! nearest-neighbour queries. Distances are reported raw, in the metric the
//! index was built with; callers convert them with
//! [`rag_types::DistanceMetric::similarity`].
//!
//! ## Features
//! - usearch HNSW graph with a RocksDB record store
//! - JSON manifest recording metric, dimension and embedding model
//! - Read-only opening for concurrent queries
//! - Staged builds swapped in atomically, plus whole-index drop
//! - Exact in-memory store for tests and small corpora

pub mod error;
pub mod hnsw;
pub mod index;
pub mod lifecycle;
pub mod memory;
pub mod metadata;
pub mod store;

pub use error::VectorError;
pub use hnsw::{HnswConfig, HnswIndex};
pub use index::{IndexStats, Neighbor, VectorStore};
pub use lifecycle::{
    detect_state, drop_index, previous_path, promote_staging, remove_if_exists, sibling,
    staging_path, IndexState,
};
pub use memory::InMemoryIndex;
pub use metadata::{RecordStore, StoredRecord, CF_CHUNK_RECORDS, CF_VECTOR_KEYS};
pub use store::{IndexManifest, PersistentIndex};
