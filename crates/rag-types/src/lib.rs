//! # rag-types
//!
//! Shared domain types for the grounded RAG pipeline.
//!
//! This crate defines the data that flows between the build-time and
//! query-time halves of the system:
//! - [`Document`]: raw source text read once per build
//! - [`Chunk`]: a retrievable span of a document
//! - [`ChunkRecord`]: a chunk with its identifier, vector and metadata
//! - [`RetrievalResult`]: a ranked hit produced per query
//! - [`DistanceMetric`]: the single place distances become similarities
//! - [`Settings`]: layered configuration
//!
//! ## Usage
//!
//! ```rust
//! use rag_types::{DistanceMetric, Document};
//!
//! let doc = Document::new("docs/cat-facts.txt", "Cats sleep 12-16 hours a day.");
//! assert_eq!(doc.source, "docs/cat-facts.txt");
//! assert_eq!(DistanceMetric::Euclidean.similarity(0.0), 1.0);
//! ```

pub mod config;
pub mod document;
pub mod error;
pub mod metric;

pub use config::{
    AnsweringSettings, BuildSettings, ChunkStrategyKind, ChunkingSettings, EmbeddingSettings,
    ProviderKind, RetrievalSettings, Settings, WindowUnit,
};
pub use document::{Chunk, ChunkId, ChunkMetadata, ChunkRecord, Document, RetrievalResult};
pub use error::RagError;
pub use metric::DistanceMetric;
