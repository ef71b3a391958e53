//! Answering model trait and implementations.
//!
//! An answering model turns a [`GroundedPrompt`] into text. Grounding is
//! enforced around the model by [`crate::GroundedAnswerer`], not inside it.

mod api;
mod mock;

pub use api::{ApiAnsweringModel, ApiAnsweringConfig};
pub use mock::MockAnsweringModel;

use async_trait::async_trait;
use thiserror::Error;

use crate::prompt::GroundedPrompt;

/// Receives answer text as it is generated.
pub type TokenSink<'a> = &'a mut (dyn FnMut(&str) + Send);

/// Error type for answering calls.
#[derive(Debug, Error)]
pub enum AnsweringError {
    /// Network failure, timeout, rate limit or server error
    #[error("Answering model {provider} unavailable: {message}")]
    Unavailable { provider: String, message: String },

    /// The server refused the request
    #[error("Answering model {provider} rejected the request (HTTP {status}): {message}")]
    Rejected {
        provider: String,
        status: u16,
        message: String,
    },

    /// The model reported an error mid-stream
    #[error("Answering model reported an error: {0}")]
    Model(String),

    #[error("Failed to parse answering model response: {0}")]
    Parse(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl AnsweringError {
    /// Whether resending the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AnsweringError::Unavailable { .. })
    }
}

/// Pluggable answering model.
#[async_trait]
pub trait AnsweringModel: Send + Sync {
    /// Model name for logs.
    fn name(&self) -> &str;

    /// Generate the complete answer.
    async fn answer(&self, prompt: &GroundedPrompt) -> Result<String, AnsweringError>;

    /// Generate the answer, forwarding text to `sink` as it arrives.
    ///
    /// Returns the full answer. Models without streaming deliver it to the
    /// sink in one piece.
    async fn answer_streaming(
        &self,
        prompt: &GroundedPrompt,
        sink: TokenSink<'_>,
    ) -> Result<String, AnsweringError> {
        let text = self.answer(prompt).await?;
        sink(&text);
        Ok(text)
    }
}
