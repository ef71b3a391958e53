//! # rag-retrieval
//!
//! Query-time half of the grounded RAG pipeline.
//!
//! A question is embedded, its nearest chunks are fetched and scored by the
//! index's metric, and the answering model is instructed to use only those
//! chunks. When nothing relevant is retrieved, or any query-time step
//! fails, the answer is the literal [`FALLBACK_ANSWER`].
//!
//! ## Components
//! - [`Retriever`]: scoring, ranking and similarity threshold
//! - [`PromptBuilder`]: grounding directive plus retrieved context
//! - [`GroundedAnswerer`]: empty-context short-circuit and fallbacks
//! - [`answer`]: Ollama / OpenAI-compatible chat models and a mock

pub mod answer;
pub mod error;
pub mod guard;
pub mod prompt;
pub mod retriever;

pub use answer::{
    AnsweringError, AnsweringModel, ApiAnsweringConfig, ApiAnsweringModel, MockAnsweringModel,
    TokenSink,
};
pub use error::RetrievalError;
pub use guard::{AnswerOutcome, GroundedAnswerer, GuardedAnswer};
pub use prompt::{GroundedPrompt, PromptBuilder, FALLBACK_ANSWER};
pub use retriever::{Retriever, RetrieverConfig};
