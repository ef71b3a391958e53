//! Deterministic bag-of-words embedder.
//!
//! Each vocabulary term is one dimension; a text's vector counts how often
//! each term occurs. No network, no model download. Used for offline runs
//! and for tests that need predictable distances.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde_json::json;

use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingProvider, ProviderInfo};
use crate::normalizer::ResponseNormalizer;

pub struct KeywordEmbedder {
    vocabulary: Vec<String>,
    info: ProviderInfo,
    normalizer: ResponseNormalizer,
    calls: AtomicUsize,
}

impl KeywordEmbedder {
    pub fn new<I, S>(vocabulary: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let vocabulary: Vec<String> = vocabulary
            .into_iter()
            .map(|s| s.into().to_lowercase())
            .collect();
        let dimension = vocabulary.len();
        Self {
            vocabulary,
            info: ProviderInfo {
                provider: "keyword".to_string(),
                model: format!("bag-of-words-{}", dimension),
            },
            normalizer: ResponseNormalizer::new()
                .with_expected_dimension(Some(dimension))
                .with_unit_length(true),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn dimension(&self) -> usize {
        self.vocabulary.len()
    }

    /// Number of `embed_batch` calls served.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn vectorize(&self, text: &str) -> Vec<f32> {
        let mut counts = vec![0.0f32; self.vocabulary.len()];
        for token in tokenize(text) {
            if let Some(i) = self.vocabulary.iter().position(|term| *term == token) {
                counts[i] += 1.0;
            }
        }
        counts
    }
}

fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        if self.vocabulary.is_empty() {
            return Err(EmbeddingError::Config(
                "keyword embedder has an empty vocabulary".to_string(),
            ));
        }
        self.calls.fetch_add(1, Ordering::SeqCst);

        if texts.is_empty() {
            return Ok(Vec::new());
        }

        // Same path as a remote reply so the normalizer checks apply.
        let vectors: Vec<Vec<f32>> = texts.iter().map(|t| self.vectorize(t)).collect();
        self.normalizer
            .normalize(&json!({ "embeddings": vectors }), texts.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedder() -> KeywordEmbedder {
        KeywordEmbedder::new(["cats", "sleep", "hours", "claws"])
    }

    #[tokio::test]
    async fn test_counts_terms_case_insensitively() {
        let out = embedder()
            .embed_batch(&["Cats sleep. CATS!".to_string()])
            .await
            .unwrap();
        // [2, 1, 0, 0] normalized
        let norm = (5.0f32).sqrt();
        assert!((out[0].values[0] - 2.0 / norm).abs() < 1e-6);
        assert!((out[0].values[1] - 1.0 / norm).abs() < 1e-6);
        assert_eq!(out[0].values[3], 0.0);
    }

    #[tokio::test]
    async fn test_unknown_words_give_zero_vector() {
        let out = embedder()
            .embed_batch(&["The capital of France".to_string()])
            .await
            .unwrap();
        assert!(out[0].values.iter().all(|v| *v == 0.0));
    }

    #[tokio::test]
    async fn test_deterministic_and_counted() {
        let e = embedder();
        let a = e.embed("cats have claws").await.unwrap();
        let b = e.embed("cats have claws").await.unwrap();
        assert_eq!(a, b);
        assert_eq!(e.calls(), 2);
    }

    #[tokio::test]
    async fn test_empty_vocabulary_is_config_error() {
        let e = KeywordEmbedder::new(Vec::<String>::new());
        assert!(matches!(
            e.embed("x").await,
            Err(EmbeddingError::Config(_))
        ));
    }
}
