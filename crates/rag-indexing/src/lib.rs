//! # rag-indexing
//!
//! Build-time half of the grounded RAG pipeline.
//!
//! Documents are split by a [`Chunker`], given random identifiers by the
//! [`IdentityAssigner`], embedded in batches and written to a staged index
//! that replaces the live one only when the whole build succeeds.
//!
//! ## Components
//! - [`chunking`]: sentence, paragraph, line and sliding-window strategies
//! - [`identity`]: collision-checked ULID assignment
//! - [`decision`]: skip / rebuild / incremental state machine
//! - [`builder`]: batch embedding, build lock, staged swap
//! - [`progress`]: per-batch callbacks and the final [`BuildReport`]

pub mod builder;
pub mod chunking;
pub mod corpus;
pub mod decision;
pub mod error;
pub mod identity;
pub mod lock;
pub mod progress;

pub use builder::{clean_index, BuilderConfig, IndexBuilder};
pub use chunking::{
    build_chunker, Chunker, LineChunker, ParagraphChunker, SentenceChunker, SlidingWindowChunker,
};
pub use corpus::load_corpus;
pub use decision::{resolve_decision, DecisionPrompt, RebuildDecision};
pub use error::IndexingError;
pub use identity::{IdSource, IdentityAssigner, UlidSource};
pub use lock::BuildLock;
pub use progress::{
    BuildProgress, BuildReport, LoggingProgressCallback, NoOpProgressCallback, ProgressCallback,
};
