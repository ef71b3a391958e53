//! Index builder.
//!
//! A build runs as one exclusive phase per index path:
//! 1. take the build lock
//! 2. detect the index state and resolve the rebuild decision
//! 3. chunk documents, assign ids, embed in batches into a staging index
//! 4. swap the staging index into place
//!
//! A failed build removes its staging directory and leaves the previous
//! index untouched.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::stream::{self, StreamExt};
use rag_embeddings::{EmbeddingError, EmbeddingProvider};
use rag_types::{Chunk, ChunkId, ChunkRecord, DistanceMetric, Document, Settings};
use rag_vector::{
    detect_state, drop_index, previous_path, promote_staging, remove_if_exists, staging_path,
    PersistentIndex, VectorStore,
};
use tracing::{debug, error, info, warn};

use crate::chunking::Chunker;
use crate::decision::{resolve_decision, DecisionPrompt, RebuildDecision};
use crate::error::IndexingError;
use crate::identity::IdentityAssigner;
use crate::lock::BuildLock;
use crate::progress::{BuildProgress, BuildReport, NoOpProgressCallback, ProgressCallback};

/// Configuration for index builds.
#[derive(Debug, Clone)]
pub struct BuilderConfig {
    /// Directory of the live index
    pub persist_path: PathBuf,
    pub metric: DistanceMetric,
    /// Chunks per embedding request
    pub batch_size: usize,
    /// Pause before each request beyond the first wave
    pub batch_delay: Duration,
    /// Embedding requests in flight at once
    pub max_concurrent_batches: usize,
    /// Skip failed batches instead of aborting
    pub accept_partial: bool,
}

impl BuilderConfig {
    pub fn new(persist_path: impl Into<PathBuf>) -> Self {
        Self {
            persist_path: persist_path.into(),
            metric: DistanceMetric::default(),
            batch_size: 64,
            batch_delay: Duration::ZERO,
            max_concurrent_batches: 1,
            accept_partial: false,
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            persist_path: settings.expanded_persist_path(),
            metric: settings.metric,
            batch_size: settings.build.batch_size,
            batch_delay: Duration::from_millis(settings.build.batch_delay_ms),
            max_concurrent_batches: settings.build.max_concurrent_batches,
            accept_partial: settings.build.accept_partial,
        }
    }

    pub fn with_metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_concurrency(mut self, max_concurrent_batches: usize) -> Self {
        self.max_concurrent_batches = max_concurrent_batches;
        self
    }

    pub fn with_batch_delay(mut self, delay: Duration) -> Self {
        self.batch_delay = delay;
        self
    }

    pub fn with_accept_partial(mut self, accept_partial: bool) -> Self {
        self.accept_partial = accept_partial;
        self
    }
}

/// Counts from filling the staging index.
struct StagedBuild {
    documents: usize,
    chunks: usize,
    reused_records: usize,
    records_written: usize,
    batches: usize,
    failed_batches: Vec<usize>,
}

type Batch = Vec<(ChunkId, Chunk)>;

/// Builds a persisted index from documents.
pub struct IndexBuilder {
    config: BuilderConfig,
    chunker: Box<dyn Chunker>,
    embedder: Arc<dyn EmbeddingProvider>,
    progress: Box<dyn ProgressCallback>,
}

impl IndexBuilder {
    pub fn new(
        config: BuilderConfig,
        chunker: Box<dyn Chunker>,
        embedder: Arc<dyn EmbeddingProvider>,
    ) -> Self {
        Self {
            config,
            chunker,
            embedder,
            progress: Box::new(NoOpProgressCallback),
        }
    }

    pub fn with_progress(mut self, progress: Box<dyn ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn config(&self) -> &BuilderConfig {
        &self.config
    }

    /// Build the index from `documents`.
    ///
    /// With `force`, a populated index is rebuilt without consulting `prompt`.
    pub async fn build(
        &self,
        documents: &[Document],
        force: bool,
        prompt: &dyn DecisionPrompt,
    ) -> Result<BuildReport, IndexingError> {
        if self.config.batch_size == 0 {
            return Err(IndexingError::Chunking(
                "batch_size must be at least 1".to_string(),
            ));
        }

        let started = Instant::now();
        let target = self.config.persist_path.as_path();
        let _lock = BuildLock::acquire(target)?;

        let state_before = detect_state(target);
        let decision = resolve_decision(state_before, force, prompt);
        info!(path = ?target, state = %state_before, decision = %decision, "Starting build");

        if decision == RebuildDecision::Skip {
            info!(path = ?target, "Keeping existing index");
            return Ok(BuildReport::skipped(
                state_before,
                started.elapsed().as_millis() as u64,
            ));
        }

        let staging = staging_path(target);
        remove_if_exists(&staging)?;

        let staged = match self.populate(&staging, documents, decision).await {
            Ok(staged) => staged,
            Err(e) => {
                if let Err(cleanup) = remove_if_exists(&staging) {
                    warn!(path = ?staging, error = %cleanup, "Failed to remove staging index");
                }
                return Err(e);
            }
        };

        promote_staging(&staging, target)?;
        let state_after = detect_state(target);

        let report = BuildReport {
            decision,
            documents: staged.documents,
            chunks: staged.chunks,
            reused_records: staged.reused_records,
            records_written: staged.records_written,
            batches: staged.batches,
            failed_batches: staged.failed_batches,
            elapsed_ms: started.elapsed().as_millis() as u64,
            state_before,
            state_after,
        };
        info!(
            records = report.total_records(),
            written = report.records_written,
            batches = report.batches,
            failed = report.failed_batches.len(),
            elapsed_ms = report.elapsed_ms,
            "Build complete"
        );
        Ok(report)
    }

    async fn populate(
        &self,
        staging: &Path,
        documents: &[Document],
        decision: RebuildDecision,
    ) -> Result<StagedBuild, IndexingError> {
        let mut index =
            PersistentIndex::create(staging, self.config.metric, &self.embedder.info().model)?;
        let mut identity = IdentityAssigner::new();
        let mut represented: HashSet<String> = HashSet::new();
        let mut reused_records = 0;

        if decision == RebuildDecision::Incremental {
            let previous = PersistentIndex::open_with_metric(
                &self.config.persist_path,
                self.config.metric,
                true,
            )?;
            let records = previous.records()?;
            identity.reserve(records.iter().map(|r| r.id));
            represented.extend(records.iter().map(|r| r.metadata.source.clone()));
            reused_records = records.len();
            index.upsert_batch(records)?;
            info!(reused = reused_records, sources = represented.len(), "Carried over existing records");
        }

        let pending: Vec<&Document> = documents
            .iter()
            .filter(|d| !represented.contains(&d.source))
            .collect();

        let mut chunks = Vec::new();
        for document in &pending {
            let before = chunks.len();
            chunks.extend(self.chunker.chunks(document));
            if chunks.len() == before {
                warn!(source = %document.source, "Document produced no chunks");
            }
        }
        debug!(
            documents = pending.len(),
            chunks = chunks.len(),
            strategy = self.chunker.name(),
            "Chunked corpus"
        );

        let assigned = identity.assign_all(chunks)?;
        let chunk_count = assigned.len();
        let batches = into_batches(assigned, self.config.batch_size);
        let batch_count = batches.len();

        let (records_written, failed_batches) = self.embed_batches(&mut index, batches).await?;

        index.flush()?;
        drop(index);

        Ok(StagedBuild {
            documents: pending.len(),
            chunks: chunk_count,
            reused_records,
            records_written,
            batches: batch_count,
            failed_batches,
        })
    }

    /// Embed batches with bounded concurrency and write them in batch order.
    async fn embed_batches(
        &self,
        index: &mut PersistentIndex,
        batches: Vec<Batch>,
    ) -> Result<(usize, Vec<usize>), IndexingError> {
        let embedder = &self.embedder;
        let concurrency = self.config.max_concurrent_batches.max(1);
        let delay = self.config.batch_delay;
        let mut progress = BuildProgress::new(batches.len());
        let mut failed = Vec::new();

        let results = stream::iter(batches.into_iter().enumerate().map(|(i, batch)| async move {
            if i >= concurrency && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            let texts: Vec<String> = batch.iter().map(|(_, chunk)| chunk.text.clone()).collect();
            debug!(batch = i, size = texts.len(), "Embedding batch");
            let result = embedder.embed_batch(&texts).await;
            (i, batch, result)
        }))
        .buffered(concurrency);
        let mut results = std::pin::pin!(results);

        while let Some((i, batch, result)) = results.next().await {
            let size = batch.len();
            let result = result.and_then(|embeddings| {
                if embeddings.len() == size {
                    Ok(embeddings)
                } else {
                    Err(EmbeddingError::VectorCountMismatch {
                        expected: size,
                        actual: embeddings.len(),
                    })
                }
            });

            match result {
                Ok(embeddings) => {
                    let records: Vec<ChunkRecord> = batch
                        .into_iter()
                        .zip(embeddings)
                        .map(|((id, chunk), embedding)| {
                            ChunkRecord::new(id, chunk, embedding.into_values())
                        })
                        .collect();
                    index.upsert_batch(records)?;
                    progress.record_batch(size);
                }
                Err(source) if self.config.accept_partial => {
                    warn!(batch = i, size, error = %source, "Embedding batch failed, skipping");
                    failed.push(i);
                    progress.record_failure();
                }
                Err(source) => {
                    error!(batch = i, size, error = %source, "Embedding batch failed, aborting build");
                    return Err(IndexingError::BatchFailed {
                        batch: i,
                        size,
                        source,
                    });
                }
            }
            self.progress.on_progress(&progress);
        }

        Ok((progress.records_written, failed))
    }
}

fn into_batches(assigned: Vec<(ChunkId, Chunk)>, batch_size: usize) -> Vec<Batch> {
    let mut batches = Vec::new();
    let mut iter = assigned.into_iter().peekable();
    while iter.peek().is_some() {
        batches.push(iter.by_ref().take(batch_size).collect());
    }
    batches
}

/// Delete the index at `path` and any leftover staging directories.
///
/// Takes the build lock, so it fails with `Busy` while a build runs.
pub fn clean_index(path: &Path) -> Result<bool, IndexingError> {
    let _lock = BuildLock::acquire(path)?;
    remove_if_exists(&staging_path(path))?;
    remove_if_exists(&previous_path(path))?;
    Ok(drop_index(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::SentenceChunker;
    use crate::progress::LoggingProgressCallback;
    use async_trait::async_trait;
    use rag_embeddings::{Embedding, KeywordEmbedder, ProviderInfo};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use rag_vector::IndexState;
    use tempfile::TempDir;

    /// Fails on the given call numbers (0-based), delegates otherwise.
    struct FailingEmbedder {
        inner: KeywordEmbedder,
        fail_on: Vec<usize>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for FailingEmbedder {
        fn info(&self) -> &ProviderInfo {
            self.inner.info()
        }

        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_on.contains(&call) {
                return Err(EmbeddingError::MalformedEmbeddingResponse {
                    shape: "object{error: string}".to_string(),
                });
            }
            self.inner.embed_batch(texts).await
        }
    }

    const CAT_FACTS: &str = "Cats sleep 12-16 hours a day. Cats have retractable claws.";

    fn keyword() -> KeywordEmbedder {
        KeywordEmbedder::new(["cats", "sleep", "hours", "claws", "retractable", "dog"])
    }

    fn builder(path: &Path, embedder: Arc<dyn EmbeddingProvider>) -> IndexBuilder {
        IndexBuilder::new(
            BuilderConfig::new(path).with_batch_size(1),
            Box::new(SentenceChunker::default()),
            embedder,
        )
    }

    fn ids(path: &Path) -> HashSet<ChunkId> {
        PersistentIndex::open_read_only(path)
            .unwrap()
            .records()
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect()
    }

    #[tokio::test]
    async fn test_fresh_build() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index");
        let docs = vec![Document::new("cat-facts.txt", CAT_FACTS)];

        let report = builder(&path, Arc::new(keyword()))
            .build(&docs, true, &RebuildDecision::Skip)
            .await
            .unwrap();

        assert_eq!(report.decision, RebuildDecision::Rebuild);
        assert_eq!(report.state_before, IndexState::Absent);
        assert_eq!(report.state_after, IndexState::PresentNonEmpty);
        assert_eq!(report.chunks, 2);
        assert_eq!(report.records_written, 2);
        assert_eq!(report.batches, 2);
        assert_eq!(ids(&path).len(), 2);
        assert!(!staging_path(&path).exists());
    }

    #[tokio::test]
    async fn test_skip_keeps_ids() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index");
        let docs = vec![Document::new("cat-facts.txt", CAT_FACTS)];
        let embedder = Arc::new(keyword());

        builder(&path, embedder.clone())
            .build(&docs, false, &RebuildDecision::Skip)
            .await
            .unwrap();
        let first = ids(&path);

        let report = builder(&path, embedder.clone())
            .build(&docs, false, &RebuildDecision::Skip)
            .await
            .unwrap();

        assert_eq!(report.decision, RebuildDecision::Skip);
        assert_eq!(ids(&path), first);
        // second build never embedded anything
        assert_eq!(embedder.calls(), 2);
    }

    #[tokio::test]
    async fn test_force_rebuild_issues_fresh_ids() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index");
        let docs = vec![Document::new("cat-facts.txt", CAT_FACTS)];

        builder(&path, Arc::new(keyword()))
            .build(&docs, true, &RebuildDecision::Skip)
            .await
            .unwrap();
        let first = ids(&path);

        builder(&path, Arc::new(keyword()))
            .build(&docs, true, &RebuildDecision::Skip)
            .await
            .unwrap();
        let second = ids(&path);

        assert_eq!(first.len(), second.len());
        assert!(first.is_disjoint(&second));
    }

    #[tokio::test]
    async fn test_incremental_embeds_only_new_sources() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index");
        let embedder = Arc::new(keyword());

        let first_docs = vec![Document::new("cats.txt", CAT_FACTS)];
        builder(&path, embedder.clone())
            .build(&first_docs, true, &RebuildDecision::Skip)
            .await
            .unwrap();
        let first = ids(&path);

        let docs = vec![
            Document::new("cats.txt", CAT_FACTS),
            Document::new("dogs.txt", "A dog barks."),
        ];
        let report = builder(&path, embedder.clone())
            .build(&docs, false, &RebuildDecision::Incremental)
            .await
            .unwrap();

        assert_eq!(report.decision, RebuildDecision::Incremental);
        assert_eq!(report.documents, 1);
        assert_eq!(report.reused_records, 2);
        assert_eq!(report.records_written, 1);
        let after = ids(&path);
        assert_eq!(after.len(), 3);
        assert!(first.is_subset(&after));
    }

    #[tokio::test]
    async fn test_batch_failure_aborts_and_keeps_previous_index() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index");
        let docs = vec![Document::new("cat-facts.txt", CAT_FACTS)];

        builder(&path, Arc::new(keyword()))
            .build(&docs, true, &RebuildDecision::Skip)
            .await
            .unwrap();
        let before = ids(&path);

        let failing = Arc::new(FailingEmbedder {
            inner: keyword(),
            fail_on: vec![1],
            calls: Default::default(),
        });
        let err = builder(&path, failing)
            .build(&docs, true, &RebuildDecision::Skip)
            .await
            .unwrap_err();

        match err {
            IndexingError::BatchFailed { batch, size, .. } => {
                assert_eq!(batch, 1);
                assert_eq!(size, 1);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(ids(&path), before);
        assert!(!staging_path(&path).exists());
    }

    #[tokio::test]
    async fn test_accept_partial_skips_failed_batch() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index");
        let docs = vec![Document::new("cat-facts.txt", CAT_FACTS)];

        let failing = Arc::new(FailingEmbedder {
            inner: keyword(),
            fail_on: vec![0],
            calls: Default::default(),
        });
        let builder = IndexBuilder::new(
            BuilderConfig::new(&path)
                .with_batch_size(1)
                .with_accept_partial(true),
            Box::new(SentenceChunker::default()),
            failing,
        )
        .with_progress(Box::new(LoggingProgressCallback::new(1)));

        let report = builder
            .build(&docs, true, &RebuildDecision::Skip)
            .await
            .unwrap();

        assert_eq!(report.failed_batches, vec![0]);
        assert_eq!(report.records_written, 1);
        assert!(report.is_partial());
    }

    #[tokio::test]
    async fn test_concurrent_batches_written_in_order() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index");
        let text: String = (0..10).map(|i| format!("Cats sleep {} hours. ", i)).collect();
        let docs = vec![Document::new("many.txt", text)];

        let builder = IndexBuilder::new(
            BuilderConfig::new(&path)
                .with_batch_size(3)
                .with_concurrency(4)
                .with_batch_delay(Duration::from_millis(1)),
            Box::new(SentenceChunker::default()),
            Arc::new(keyword()),
        );
        let report = builder
            .build(&docs, true, &RebuildDecision::Skip)
            .await
            .unwrap();

        assert_eq!(report.batches, 4);
        assert_eq!(report.records_written, 10);
    }

    #[tokio::test]
    async fn test_build_while_locked_is_busy() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index");
        let _held = BuildLock::acquire(&path).unwrap();

        let err = builder(&path, Arc::new(keyword()))
            .build(&[Document::new("d", CAT_FACTS)], true, &RebuildDecision::Skip)
            .await
            .unwrap_err();
        assert!(matches!(err, IndexingError::Busy { .. }));
    }

    #[tokio::test]
    async fn test_clean_index() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("index");
        builder(&path, Arc::new(keyword()))
            .build(&[Document::new("d", CAT_FACTS)], true, &RebuildDecision::Skip)
            .await
            .unwrap();

        assert!(clean_index(&path).unwrap());
        assert_eq!(detect_state(&path), IndexState::Absent);
        assert!(!clean_index(&path).unwrap());
    }

    #[test]
    fn test_into_batches() {
        let assigned: Vec<(ChunkId, Chunk)> = (0..7)
            .map(|i| (ChunkId::generate(), Chunk::new("d", i, "x")))
            .collect();
        let batches = into_batches(assigned, 3);
        let sizes: Vec<usize> = batches.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }
}
