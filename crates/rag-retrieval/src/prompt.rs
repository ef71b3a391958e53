//! Grounded prompt construction.
//!
//! The instruction handed to the answering model contains the retrieved
//! chunk texts and nothing else as context, tells the model to answer only
//! from them, names the literal fallback sentence, and forbids adding facts.

use rag_types::RetrievalResult;

/// Emitted verbatim when the context cannot answer the question.
pub const FALLBACK_ANSWER: &str = "I don't know based on the given context.";

const DEFAULT_PERSONA: &str = "You are a helpful chatbot.";

/// Everything an answering model receives for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundedPrompt {
    /// Grounding directive plus the context block
    pub system: String,
    pub question: String,
    /// Chunk texts included in `system`, in rank order
    pub context: Vec<String>,
}

impl GroundedPrompt {
    /// System instruction and question as one string, for models that take
    /// a single prompt.
    pub fn render(&self) -> String {
        format!("{}\nQuestion: {}\n", self.system, self.question)
    }
}

#[derive(Debug, Clone)]
pub struct PromptBuilder {
    persona: String,
}

impl Default for PromptBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptBuilder {
    pub fn new() -> Self {
        Self {
            persona: DEFAULT_PERSONA.to_string(),
        }
    }

    /// Replace the opening line of the instruction.
    pub fn with_persona(mut self, persona: impl Into<String>) -> Self {
        self.persona = persona.into();
        self
    }

    pub fn build(&self, question: &str, results: &[RetrievalResult]) -> GroundedPrompt {
        let context: Vec<String> = results.iter().map(|r| r.text.clone()).collect();
        GroundedPrompt {
            system: self.instruction(&context),
            question: question.trim().to_string(),
            context,
        }
    }

    fn instruction(&self, context: &[String]) -> String {
        let mut out = String::new();
        out.push_str(&self.persona);
        out.push('\n');
        out.push_str("Use ONLY the following pieces of context to answer the question.\n");
        out.push_str(&format!(
            "If the context does not contain the answer, reply with: \"{}\"\n",
            FALLBACK_ANSWER
        ));
        out.push_str(
            "Do NOT add facts that are not in the context. You may summarize, combine or explain the pieces, but never invent.\n",
        );
        out.push_str("\nRetrieved Context:\n");
        for text in context {
            // keep multi-line chunks inside their bullet
            out.push_str(" - ");
            out.push_str(&text.trim().replace('\n', "\n   "));
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rag_types::{Chunk, ChunkId};

    fn result(text: &str) -> RetrievalResult {
        RetrievalResult {
            id: ChunkId::generate(),
            text: text.to_string(),
            distance: 0.5,
            similarity: 0.66,
            metadata: Chunk::new("facts.txt", 0, text).metadata(),
        }
    }

    #[test]
    fn test_instruction_contains_directives_and_context() {
        let prompt = PromptBuilder::new().build(
            " How much do cats sleep? ",
            &[
                result("Cats sleep 12-16 hours a day."),
                result("Cats have retractable claws."),
            ],
        );

        assert_eq!(prompt.question, "How much do cats sleep?");
        assert!(prompt.system.contains("Use ONLY the following pieces of context"));
        assert!(prompt.system.contains(FALLBACK_ANSWER));
        assert!(prompt.system.contains("Do NOT add facts"));
        assert!(prompt.system.contains(" - Cats sleep 12-16 hours a day.\n"));
        assert!(prompt.system.contains(" - Cats have retractable claws.\n"));
        assert_eq!(prompt.context.len(), 2);
    }

    #[test]
    fn test_context_is_only_retrieved_text() {
        let prompt = PromptBuilder::new().build("q", &[result("Only fact.")]);
        let context_block = prompt
            .system
            .split("Retrieved Context:\n")
            .nth(1)
            .unwrap();
        assert_eq!(context_block, " - Only fact.\n");
    }

    #[test]
    fn test_multiline_chunk_stays_in_bullet() {
        let prompt = PromptBuilder::new().build("q", &[result("line one\nline two")]);
        assert!(prompt.system.contains(" - line one\n   line two\n"));
    }

    #[test]
    fn test_render_appends_question() {
        let prompt = PromptBuilder::new()
            .with_persona("You answer questions about cats.")
            .build("Do cats purr?", &[result("Cats purr.")]);
        let rendered = prompt.render();
        assert!(rendered.starts_with("You answer questions about cats.\n"));
        assert!(rendered.ends_with("Question: Do cats purr?\n"));
    }
}
