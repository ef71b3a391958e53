//! End-to-end test infrastructure for the grounded RAG pipeline.
//!
//! Provides a shared TestHarness and helper functions for E2E tests
//! covering the full corpus-to-answer pipeline, offline: embeddings come
//! from a fixed-vocabulary [`KeywordEmbedder`] and answers from a
//! [`MockAnsweringModel`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rag_embeddings::{EmbeddingProvider, KeywordEmbedder};
use rag_indexing::{BuilderConfig, IndexBuilder, SentenceChunker};
use rag_retrieval::{AnsweringModel, GroundedAnswerer, Retriever};
use rag_types::{ChunkId, ChunkRecord, DistanceMetric, Document};
use rag_vector::{PersistentIndex, VectorStore};

/// The two-sentence corpus used by the end-to-end scenarios.
pub const CAT_FACTS: &str = "Cats sleep 12-16 hours a day. Cats have retractable claws.";

/// Vocabulary covering the cat facts and the unrelated France question.
pub const VOCABULARY: [&str; 8] = [
    "cats",
    "sleep",
    "hours",
    "day",
    "claws",
    "retractable",
    "capital",
    "france",
];

/// Shared test harness for E2E tests.
///
/// Owns a temp directory holding the corpus file and the index.
pub struct TestHarness {
    /// Keeps temp dir alive for the lifetime of the harness
    pub _temp_dir: tempfile::TempDir,
    /// Live index directory (created by builds)
    pub index_path: PathBuf,
    /// Directory corpus files are written to
    pub corpus_dir: PathBuf,
    pub metric: DistanceMetric,
}

impl TestHarness {
    /// Create a new test harness with an empty temp directory.
    pub fn new() -> Self {
        let temp_dir = tempfile::TempDir::new().expect("Failed to create temp dir");
        let index_path = temp_dir.path().join("index");
        let corpus_dir = temp_dir.path().join("docs");
        std::fs::create_dir_all(&corpus_dir).expect("Failed to create corpus dir");

        Self {
            _temp_dir: temp_dir,
            index_path,
            corpus_dir,
            metric: DistanceMetric::Euclidean,
        }
    }

    /// Write a corpus file and return its path.
    pub fn write_corpus(&self, name: &str, text: &str) -> PathBuf {
        let path = self.corpus_dir.join(name);
        std::fs::write(&path, text).expect("Failed to write corpus file");
        path
    }

    /// Builder with one-sentence chunks over this harness's index.
    pub fn builder(&self, embedder: Arc<dyn EmbeddingProvider>) -> IndexBuilder {
        self.builder_with(BuilderConfig::new(&self.index_path), embedder)
    }

    pub fn builder_with(
        &self,
        config: BuilderConfig,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> IndexBuilder {
        let chunker = SentenceChunker::new(1).expect("valid chunker");
        IndexBuilder::new(config.with_metric(self.metric), Box::new(chunker), embedder)
    }

    /// Read-only retriever over the built index.
    pub fn retriever(&self, embedder: Arc<dyn EmbeddingProvider>) -> Retriever {
        Retriever::open(&self.index_path, self.metric, embedder).expect("Failed to open index")
    }

    pub fn answerer(
        &self,
        embedder: Arc<dyn EmbeddingProvider>,
        model: Arc<dyn AnsweringModel>,
        min_similarity: Option<f32>,
    ) -> GroundedAnswerer {
        let retriever = self
            .retriever(embedder)
            .with_top_k(1)
            .with_min_similarity(min_similarity);
        GroundedAnswerer::new(retriever, model)
    }

    /// Every record of the built index, sorted by id.
    pub fn records(&self) -> Vec<ChunkRecord> {
        records_at(&self.index_path)
    }

    /// Record ids of the built index, sorted.
    pub fn record_ids(&self) -> Vec<ChunkId> {
        self.records().into_iter().map(|r| r.id).collect()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Keyword embedder over [`VOCABULARY`].
pub fn cat_facts_embedder() -> Arc<KeywordEmbedder> {
    Arc::new(KeywordEmbedder::new(VOCABULARY))
}

/// The cat-facts corpus as a single document.
pub fn cat_facts_corpus() -> Vec<Document> {
    vec![Document::new("docs/cat-facts.txt", CAT_FACTS)]
}

/// Records of the index at `path`, sorted by id.
pub fn records_at(path: &Path) -> Vec<ChunkRecord> {
    let index = PersistentIndex::open_read_only(path).expect("Failed to open index");
    let mut records = index.records().expect("Failed to read records");
    records.sort_by_key(|r| r.id);
    records
}
