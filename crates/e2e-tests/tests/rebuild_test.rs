//! End-to-end rebuild state machine tests.
//!
//! absent -> build -> skip (ids stable) -> force (fresh ids, same count)
//! -> incremental (new documents only) -> clean (absent).

use pretty_assertions::assert_eq;

use e2e_tests::{cat_facts_corpus, cat_facts_embedder, TestHarness};
use rag_indexing::{clean_index, load_corpus, RebuildDecision};
use rag_types::Document;
use rag_vector::{detect_state, IndexState};

/// A forced rebuild replaces every identifier and is not additive.
#[tokio::test]
async fn test_force_rebuild_issues_fresh_ids() {
    let harness = TestHarness::new();
    let embedder = cat_facts_embedder();
    let builder = harness.builder(embedder);

    builder
        .build(&cat_facts_corpus(), false, &RebuildDecision::Skip)
        .await
        .expect("first build failed");
    let first = harness.record_ids();

    let report = builder
        .build(&cat_facts_corpus(), true, &RebuildDecision::Skip)
        .await
        .expect("rebuild failed");
    let second = harness.record_ids();

    assert_eq!(report.decision, RebuildDecision::Rebuild);
    assert_eq!(report.state_before, IndexState::PresentNonEmpty);
    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), first.len());
    assert!(first.iter().all(|id| !second.contains(id)));
}

/// Skipping leaves the index and its identifiers untouched and embeds
/// nothing.
#[tokio::test]
async fn test_skip_keeps_ids() {
    let harness = TestHarness::new();
    let embedder = cat_facts_embedder();
    let builder = harness.builder(embedder.clone());

    builder
        .build(&cat_facts_corpus(), false, &RebuildDecision::Skip)
        .await
        .expect("first build failed");
    let before = harness.records();
    let calls = embedder.calls();

    let report = builder
        .build(&cat_facts_corpus(), false, &RebuildDecision::Skip)
        .await
        .expect("skip failed");

    assert_eq!(report.decision, RebuildDecision::Skip);
    assert_eq!(report.records_written, 0);
    assert_eq!(embedder.calls(), calls);
    assert_eq!(harness.records(), before);
}

/// Incremental builds keep existing records and embed only new sources.
#[tokio::test]
async fn test_incremental_adds_new_documents() {
    let harness = TestHarness::new();
    let embedder = cat_facts_embedder();
    let builder = harness.builder(embedder);

    builder
        .build(&cat_facts_corpus(), false, &RebuildDecision::Skip)
        .await
        .expect("first build failed");
    let before = harness.record_ids();

    let mut corpus = cat_facts_corpus();
    corpus.push(Document::new("docs/more.txt", "Cats sleep through the day."));
    let report = builder
        .build(&corpus, false, &RebuildDecision::Incremental)
        .await
        .expect("incremental build failed");

    assert_eq!(report.decision, RebuildDecision::Incremental);
    assert_eq!(report.reused_records, 2);
    assert_eq!(report.records_written, 1);

    let after = harness.record_ids();
    assert_eq!(after.len(), 3);
    assert!(before.iter().all(|id| after.contains(id)));
}

/// Build from files on disk, then clean back to absent.
#[tokio::test]
async fn test_build_from_corpus_dir_then_clean() {
    let harness = TestHarness::new();
    harness.write_corpus("a.txt", "Cats sleep 12-16 hours a day.");
    harness.write_corpus("b.md", "Cats have retractable claws.");
    harness.write_corpus("ignored.json", "{\"cats\": true}");

    let documents = load_corpus(&harness.corpus_dir).expect("corpus load failed");
    assert_eq!(documents.len(), 2);

    let report = harness
        .builder(cat_facts_embedder())
        .build(&documents, false, &RebuildDecision::Skip)
        .await
        .expect("build failed");
    assert_eq!(report.total_records(), 2);

    let sources: Vec<String> = harness
        .records()
        .into_iter()
        .map(|r| r.metadata.source)
        .collect();
    assert!(sources.iter().any(|s| s.ends_with("a.txt")));
    assert!(sources.iter().any(|s| s.ends_with("b.md")));

    assert!(clean_index(&harness.index_path).expect("clean failed"));
    assert_eq!(detect_state(&harness.index_path), IndexState::Absent);
    assert!(!clean_index(&harness.index_path).expect("second clean failed"));
}
