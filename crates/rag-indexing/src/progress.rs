//! Build progress and reporting.

use rag_vector::IndexState;
use serde::Serialize;
use tracing::info;

use crate::decision::RebuildDecision;

/// Progress after each embedding batch.
#[derive(Debug, Clone, Default)]
pub struct BuildProgress {
    /// Batches finished (successfully or not)
    pub batches_done: usize,
    pub batches_total: usize,
    /// Records written to the staged index so far
    pub records_written: usize,
    pub failed_batches: usize,
}

impl BuildProgress {
    pub fn new(batches_total: usize) -> Self {
        Self {
            batches_total,
            ..Default::default()
        }
    }

    pub fn record_batch(&mut self, written: usize) {
        self.batches_done += 1;
        self.records_written += written;
    }

    pub fn record_failure(&mut self) {
        self.batches_done += 1;
        self.failed_batches += 1;
    }

    pub fn is_complete(&self) -> bool {
        self.batches_done >= self.batches_total
    }
}

/// Trait for receiving build progress updates.
pub trait ProgressCallback: Send + Sync {
    /// Called after each batch is processed.
    fn on_progress(&self, progress: &BuildProgress);
}

/// A no-op progress callback for when progress reporting isn't needed.
pub struct NoOpProgressCallback;

impl ProgressCallback for NoOpProgressCallback {
    fn on_progress(&self, _progress: &BuildProgress) {}
}

/// Logs every `every` batches, and the last one, at info level.
pub struct LoggingProgressCallback {
    every: usize,
}

impl LoggingProgressCallback {
    pub fn new(every: usize) -> Self {
        Self {
            every: every.max(1),
        }
    }
}

impl ProgressCallback for LoggingProgressCallback {
    fn on_progress(&self, progress: &BuildProgress) {
        if progress.batches_done.is_multiple_of(self.every) || progress.is_complete() {
            info!(
                batches = progress.batches_done,
                total = progress.batches_total,
                records = progress.records_written,
                failed = progress.failed_batches,
                "Build progress"
            );
        }
    }
}

/// Outcome of one build invocation.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    pub decision: RebuildDecision,
    /// Documents chunked and embedded by this build
    pub documents: usize,
    /// Chunks produced by this build
    pub chunks: usize,
    /// Records carried over from the previous index (incremental builds)
    pub reused_records: usize,
    /// Records embedded and written by this build
    pub records_written: usize,
    pub batches: usize,
    /// Indices of batches skipped under `accept_partial`
    pub failed_batches: Vec<usize>,
    pub elapsed_ms: u64,
    pub state_before: IndexState,
    pub state_after: IndexState,
}

impl BuildReport {
    /// Report for a build that did nothing.
    pub fn skipped(state: IndexState, elapsed_ms: u64) -> Self {
        Self {
            decision: RebuildDecision::Skip,
            documents: 0,
            chunks: 0,
            reused_records: 0,
            records_written: 0,
            batches: 0,
            failed_batches: Vec::new(),
            elapsed_ms,
            state_before: state,
            state_after: state,
        }
    }

    /// Records in the index after this build.
    pub fn total_records(&self) -> usize {
        self.reused_records + self.records_written
    }

    pub fn is_partial(&self) -> bool {
        !self.failed_batches.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_counts() {
        let mut progress = BuildProgress::new(3);
        progress.record_batch(64);
        progress.record_failure();
        assert!(!progress.is_complete());
        progress.record_batch(10);

        assert!(progress.is_complete());
        assert_eq!(progress.records_written, 74);
        assert_eq!(progress.failed_batches, 1);
    }

    #[test]
    fn test_skipped_report() {
        let report = BuildReport::skipped(IndexState::PresentNonEmpty, 3);
        assert_eq!(report.decision, RebuildDecision::Skip);
        assert_eq!(report.state_after, IndexState::PresentNonEmpty);
        assert_eq!(report.total_records(), 0);
        assert!(!report.is_partial());
    }
}
