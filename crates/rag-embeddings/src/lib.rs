//! # rag-embeddings
//!
//! Embedding generation for the grounded RAG pipeline.
//!
//! Providers are remote services whose replies come in several shapes.
//! Every reply goes through the [`ResponseNormalizer`], which turns it into
//! exactly one fixed-length [`Embedding`] per input text or fails with a
//! typed error. Nothing past this crate ever sees a raw provider reply.
//!
//! ## Features
//! - Ollama (`/api/embed`) and OpenAI-compatible (`/embeddings`) providers
//! - Bounded request timeout with exponential-backoff retry
//! - Deterministic [`KeywordEmbedder`] for offline use and tests

pub mod error;
pub mod http;
pub mod keyword;
pub mod model;
pub mod normalizer;
pub mod retry;

pub use error::EmbeddingError;
pub use http::{HttpEmbedder, HttpEmbedderConfig};
pub use keyword::KeywordEmbedder;
pub use model::{Embedding, EmbeddingProvider, ProviderInfo};
pub use normalizer::{summarize_shape, ResponseNormalizer, ResponseShape};
pub use retry::{
    classify_status, provider_name, retry_with_backoff, transport_message, RetryPolicy,
    StatusFailure,
};
