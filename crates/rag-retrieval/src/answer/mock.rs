//! Mock answering model for testing.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::{AnsweringError, AnsweringModel};
use crate::prompt::{GroundedPrompt, FALLBACK_ANSWER};

/// Answers with the first context chunk, or a fixed reply.
///
/// Counts calls so tests can assert the model was bypassed.
pub struct MockAnsweringModel {
    reply: Option<String>,
    fail: bool,
    calls: AtomicUsize,
}

impl MockAnsweringModel {
    pub fn new() -> Self {
        Self {
            reply: None,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Always answer `reply`.
    pub fn with_reply(reply: impl Into<String>) -> Self {
        Self {
            reply: Some(reply.into()),
            ..Self::new()
        }
    }

    /// Always fail as if the server were down.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::new()
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for MockAnsweringModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AnsweringModel for MockAnsweringModel {
    fn name(&self) -> &str {
        "mock"
    }

    async fn answer(&self, prompt: &GroundedPrompt) -> Result<String, AnsweringError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(AnsweringError::Unavailable {
                provider: "mock".to_string(),
                message: "configured to fail".to_string(),
            });
        }

        Ok(match (&self.reply, prompt.context.first()) {
            (Some(reply), _) => reply.clone(),
            (None, Some(first)) => first.clone(),
            (None, None) => FALLBACK_ANSWER.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::PromptBuilder;

    #[tokio::test]
    async fn test_echoes_first_chunk() {
        let model = MockAnsweringModel::new();
        let mut prompt = PromptBuilder::new().build("q", &[]);
        prompt.context = vec!["Cats purr.".to_string(), "Cats nap.".to_string()];

        assert_eq!(model.answer(&prompt).await.unwrap(), "Cats purr.");
        assert_eq!(model.calls(), 1);
    }

    #[tokio::test]
    async fn test_default_streaming_delivers_whole_answer() {
        let model = MockAnsweringModel::with_reply("Twelve to sixteen hours.");
        let prompt = PromptBuilder::new().build("q", &[]);
        let mut seen = Vec::new();

        let text = model
            .answer_streaming(&prompt, &mut |t: &str| seen.push(t.to_string()))
            .await
            .unwrap();

        assert_eq!(text, "Twelve to sixteen hours.");
        assert_eq!(seen, vec!["Twelve to sixteen hours.".to_string()]);
    }

    #[tokio::test]
    async fn test_failing_counts_calls() {
        let model = MockAnsweringModel::failing();
        let prompt = PromptBuilder::new().build("q", &[]);
        assert!(model.answer(&prompt).await.unwrap_err().is_retryable());
        assert_eq!(model.calls(), 1);
    }
}
