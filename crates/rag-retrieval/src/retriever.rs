//! Nearest-chunk retrieval and scoring.
//!
//! The question is embedded with the same provider the index was built
//! with, the store returns its `k` nearest records, and every raw distance
//! is converted to a similarity by the store's own metric. Results carry
//! both numbers so a ranking can be audited after the fact.

use std::cmp::Ordering;
use std::path::Path;
use std::sync::Arc;

use tracing::{debug, info, warn};

use rag_embeddings::EmbeddingProvider;
use rag_types::{DistanceMetric, RetrievalResult, RetrievalSettings};
use rag_vector::{Neighbor, PersistentIndex, VectorStore};

use crate::error::RetrievalError;

/// Query-time knobs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrieverConfig {
    /// Nearest records requested from the store
    pub top_k: usize,
    /// Hits scoring below this are dropped
    pub min_similarity: Option<f32>,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            min_similarity: None,
        }
    }
}

impl RetrieverConfig {
    pub fn from_settings(settings: &RetrievalSettings) -> Self {
        Self {
            top_k: settings.top_k,
            min_similarity: settings.min_similarity,
        }
    }
}

pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            config: RetrieverConfig::default(),
        }
    }

    /// Open the persisted index at `path` read-only.
    ///
    /// Fails with `MetricMismatch` when the index was built with another
    /// metric, so one formula is never applied to the other's distances.
    pub fn open(
        path: &Path,
        metric: DistanceMetric,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Result<Self, RetrievalError> {
        let index = PersistentIndex::open_with_metric(path, metric, true)?;
        let model = &embedder.info().model;
        if index.manifest().embedding_model != *model {
            warn!(
                index_model = %index.manifest().embedding_model,
                query_model = %model,
                "Index was built with a different embedding model; similarities may be meaningless"
            );
        }
        Ok(Self::new(embedder, Arc::new(index)))
    }

    pub fn with_config(mut self, config: RetrieverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.config.top_k = top_k;
        self
    }

    pub fn with_min_similarity(mut self, min_similarity: Option<f32>) -> Self {
        self.config.min_similarity = min_similarity;
        self
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    pub fn metric(&self) -> DistanceMetric {
        self.store.metric()
    }

    /// Up to `top_k` results, highest similarity first.
    pub async fn retrieve(&self, question: &str) -> Result<Vec<RetrievalResult>, RetrievalError> {
        self.retrieve_k(question, self.config.top_k).await
    }

    /// Up to `k` results, highest similarity first.
    ///
    /// An empty index, or a threshold nothing passes, yields an empty list.
    pub async fn retrieve_k(
        &self,
        question: &str,
        k: usize,
    ) -> Result<Vec<RetrievalResult>, RetrievalError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RetrievalError::InvalidInput(
                "question is empty".to_string(),
            ));
        }
        if k == 0 {
            return Err(RetrievalError::InvalidInput("k must be > 0".to_string()));
        }
        if self.store.is_empty() {
            info!("Index is empty, nothing to retrieve");
            return Ok(Vec::new());
        }

        let query = self.embedder.embed(question).await?;
        let neighbors = self.store.nearest(&query.values, k)?;
        let metric = self.store.metric();
        let hits = neighbors.len();

        let mut results: Vec<RetrievalResult> = neighbors
            .into_iter()
            .map(|n| score(metric, n))
            .collect();
        rank(&mut results);

        if let Some(min) = self.config.min_similarity {
            results.retain(|r| r.similarity >= min);
        }

        debug!(
            k,
            hits,
            kept = results.len(),
            top = results.first().map(|r| r.similarity),
            %metric,
            "Retrieved context"
        );
        Ok(results)
    }
}

fn score(metric: DistanceMetric, neighbor: Neighbor) -> RetrievalResult {
    RetrievalResult {
        id: neighbor.id,
        similarity: metric.similarity(neighbor.distance),
        distance: neighbor.distance,
        text: neighbor.text,
        metadata: neighbor.metadata,
    }
}

/// Descending similarity; ties keep store order. NaN sorts last.
fn rank(results: &mut [RetrievalResult]) {
    results.sort_by(|a, b| match (a.similarity.is_nan(), b.similarity.is_nan()) {
        (false, false) => b
            .similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(Ordering::Equal),
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (true, true) => Ordering::Equal,
    });
}
