//! Groundedness guard.
//!
//! Wraps retrieval and the answering model so that every path that cannot
//! produce a grounded answer ends in [`FALLBACK_ANSWER`]. No retrieved
//! context means the model is never called.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, warn};

use rag_types::RetrievalResult;

use crate::answer::{AnsweringModel, TokenSink};
use crate::prompt::{PromptBuilder, FALLBACK_ANSWER};
use crate::retriever::Retriever;

/// How an answer was reached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "reason")]
pub enum AnswerOutcome {
    /// The model answered from retrieved context
    Answered,
    /// Nothing was retrieved; the model was not called
    EmptyContext,
    /// Embedding or index lookup failed
    RetrievalFailed(String),
    /// The model call failed or returned nothing
    ModelFailed(String),
}

/// Final answer plus the context it was grounded on.
#[derive(Debug, Clone, Serialize)]
pub struct GuardedAnswer {
    pub text: String,
    pub outcome: AnswerOutcome,
    pub results: Vec<RetrievalResult>,
}

impl GuardedAnswer {
    fn fallback(outcome: AnswerOutcome, results: Vec<RetrievalResult>) -> Self {
        Self {
            text: FALLBACK_ANSWER.to_string(),
            outcome,
            results,
        }
    }

    /// Whether `text` is the literal fallback sentence.
    pub fn is_fallback(&self) -> bool {
        self.text.trim() == FALLBACK_ANSWER
    }
}

pub struct GroundedAnswerer {
    retriever: Retriever,
    model: Arc<dyn AnsweringModel>,
    prompts: PromptBuilder,
}

impl GroundedAnswerer {
    pub fn new(retriever: Retriever, model: Arc<dyn AnsweringModel>) -> Self {
        Self {
            retriever,
            model,
            prompts: PromptBuilder::new(),
        }
    }

    pub fn with_prompt_builder(mut self, prompts: PromptBuilder) -> Self {
        self.prompts = prompts;
        self
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    /// Answer `question` without streaming.
    pub async fn ask(&self, question: &str) -> GuardedAnswer {
        self.ask_streaming(question, &mut |_: &str| {}).await
    }

    /// Answer `question`, forwarding model output to `sink` as it arrives.
    ///
    /// Never fails: query-time errors are logged and turned into the
    /// fallback answer. The fallback itself is not sent to `sink`.
    pub async fn ask_streaming(&self, question: &str, sink: TokenSink<'_>) -> GuardedAnswer {
        match self.retrieve(question).await {
            Ok(results) => self.answer_from(question, results, sink).await,
            Err(fallback) => fallback,
        }
    }

    /// Retrieval step on its own, for callers that show the context before
    /// the answer. A failure comes back as the finished fallback answer.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievalResult>, GuardedAnswer> {
        self.retriever.retrieve(question).await.map_err(|e| {
            warn!(error = %e, "Retrieval failed, answering with fallback");
            GuardedAnswer::fallback(AnswerOutcome::RetrievalFailed(e.to_string()), Vec::new())
        })
    }

    /// Answering step over already retrieved `results`.
    pub async fn answer_from(
        &self,
        question: &str,
        results: Vec<RetrievalResult>,
        sink: TokenSink<'_>,
    ) -> GuardedAnswer {
        if results.is_empty() {
            info!("No relevant context retrieved, answering with fallback");
            return GuardedAnswer::fallback(AnswerOutcome::EmptyContext, results);
        }

        let prompt = self.prompts.build(question, &results);
        debug!(
            model = self.model.name(),
            context = prompt.context.len(),
            "Calling answering model"
        );

        match self.model.answer_streaming(&prompt, sink).await {
            Ok(text) if text.trim().is_empty() => {
                warn!("Answering model returned an empty answer");
                GuardedAnswer::fallback(
                    AnswerOutcome::ModelFailed("empty answer".to_string()),
                    results,
                )
            }
            Ok(text) => GuardedAnswer {
                text,
                outcome: AnswerOutcome::Answered,
                results,
            },
            Err(e) => {
                warn!(error = %e, "Answering model failed, answering with fallback");
                GuardedAnswer::fallback(AnswerOutcome::ModelFailed(e.to_string()), results)
            }
        }
    }
}
