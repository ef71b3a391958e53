//! Command implementations for `rag`.
//!
//! Handles:
//! - build: load the corpus, resolve the rebuild decision, build the index
//! - ask: retrieve context and print a grounded (or fallback) answer
//! - clean: drop the index
//! - status: index state and statistics

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, warn};

use rag_embeddings::{EmbeddingProvider, HttpEmbedder, HttpEmbedderConfig};
use rag_indexing::{
    build_chunker, clean_index, load_corpus, BuilderConfig, DecisionPrompt, IndexBuilder,
    LoggingProgressCallback, RebuildDecision,
};
use rag_retrieval::{
    AnswerOutcome, ApiAnsweringConfig, ApiAnsweringModel, GroundedAnswerer, Retriever,
    RetrieverConfig, FALLBACK_ANSWER,
};
use rag_types::{RetrievalResult, Settings};
use rag_vector::{detect_state, IndexState, PersistentIndex, VectorStore};

use crate::cli::{AskArgs, BuildArgs};
use crate::prompt::InteractivePrompt;

/// Load configuration and apply CLI overrides (highest precedence).
pub fn load_settings(
    config_path: Option<&str>,
    log_level_override: Option<&str>,
    persist_path_override: Option<&str>,
) -> Result<Settings> {
    let mut settings = Settings::load(config_path).context("Failed to load configuration")?;

    if let Some(log_level) = log_level_override {
        settings.log_level = log_level.to_string();
    }
    if let Some(path) = persist_path_override {
        settings.persist_path = path.to_string();
    }
    Ok(settings)
}

/// Install the global tracing subscriber. `RUST_LOG` wins over `log_level`.
pub fn init_logging(log_level: &str) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_writer(io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn embedder(settings: &Settings) -> Result<Arc<dyn EmbeddingProvider>> {
    let embedder = HttpEmbedder::new(HttpEmbedderConfig::from_settings(&settings.embedding))
        .context("Invalid embedding configuration")?;
    Ok(Arc::new(embedder))
}

/// Build (or skip, or extend) the index.
pub async fn run_build(mut settings: Settings, args: BuildArgs) -> Result<()> {
    if let Some(corpus) = &args.corpus {
        settings.corpus_path = corpus.clone();
    }
    if let Some(batch_size) = args.batch_size {
        settings.build.batch_size = batch_size;
    }
    if args.accept_partial {
        settings.build.accept_partial = true;
    }
    settings.validate().context("Invalid build settings")?;
    if settings.batch_size_outside_recommended() {
        warn!(
            batch_size = settings.build.batch_size,
            "Batch size outside the recommended 32-128 range"
        );
    }

    let corpus_path = settings.expanded_corpus_path();
    let documents = load_corpus(&corpus_path)
        .with_context(|| format!("Failed to read corpus at {:?}", corpus_path))?;
    println!(
        "Loaded {} document(s) from {}",
        documents.len(),
        corpus_path.display()
    );

    let chunker = build_chunker(&settings.chunking).context("Invalid chunking settings")?;
    let builder = IndexBuilder::new(
        BuilderConfig::from_settings(&settings),
        chunker,
        embedder(&settings)?,
    )
    .with_progress(Box::new(LoggingProgressCallback::new(10)));

    let decision = decide(&args, detect_state(&builder.config().persist_path)).await?;

    let report = builder
        .build(&documents, args.force, &decision)
        .await
        .context("Build failed")?;

    if report.decision == RebuildDecision::Skip {
        println!(
            "Index at {} already exists; kept it unchanged.",
            builder.config().persist_path.display()
        );
        println!("Use `rag build --force` to rebuild or `rag clean` to delete it.");
        return Ok(());
    }

    println!(
        "{} finished: {} chunk(s) embedded in {} batch(es), {} record(s) total, {:.2}s",
        capitalize(&report.decision.to_string()),
        report.records_written,
        report.batches,
        report.total_records(),
        report.elapsed_ms as f64 / 1000.0
    );
    if report.is_partial() {
        println!(
            "Warning: {} batch(es) failed and were skipped: {:?}",
            report.failed_batches.len(),
            report.failed_batches
        );
    }
    println!(
        "Index persisted to {}",
        builder.config().persist_path.display()
    );
    Ok(())
}

/// Resolve the rebuild decision before the build starts. The terminal is
/// read on a blocking thread.
async fn decide(args: &BuildArgs, state: IndexState) -> Result<RebuildDecision> {
    if args.skip {
        return Ok(RebuildDecision::Skip);
    }
    if args.incremental {
        return Ok(RebuildDecision::Incremental);
    }
    if args.force || state != IndexState::PresentNonEmpty {
        return Ok(RebuildDecision::Rebuild);
    }
    tokio::task::spawn_blocking(move || InteractivePrompt.choose(state))
        .await
        .context("Rebuild prompt failed")
}

/// Answer one question.
pub async fn run_ask(mut settings: Settings, args: AskArgs) -> Result<()> {
    if let Some(k) = args.k {
        settings.retrieval.top_k = k;
    }
    if args.min_similarity.is_some() {
        settings.retrieval.min_similarity = args.min_similarity;
    }
    settings.validate().context("Invalid retrieval settings")?;

    let path = settings.expanded_persist_path();
    if detect_state(&path) == IndexState::Absent {
        println!("Index directory '{}' not found.", path.display());
        println!("Run `rag build` first to create and persist the index.");
        return Ok(());
    }

    let question = if args.question.is_empty() {
        tokio::task::spawn_blocking(|| read_question(&mut io::stdin().lock(), &mut io::stdout()))
            .await
            .context("Question prompt failed")??
    } else {
        args.question.join(" ")
    };
    let question = question.trim();
    if question.is_empty() {
        println!("Empty query, exiting.");
        return Ok(());
    }

    let retriever = match Retriever::open(&path, settings.metric, embedder(&settings)?) {
        Ok(retriever) => {
            retriever.with_config(RetrieverConfig::from_settings(&settings.retrieval))
        }
        Err(e) => {
            warn!(path = ?path, error = %e, "Index unusable, answering with fallback");
            println!("{}", FALLBACK_ANSWER);
            return Ok(());
        }
    };
    let model = ApiAnsweringModel::new(ApiAnsweringConfig::from_settings(&settings.answering))
        .context("Invalid answering model configuration")?;
    let answerer = GroundedAnswerer::new(retriever, Arc::new(model));

    let results = match answerer.retrieve(question).await {
        Ok(results) => results,
        Err(fallback) => {
            println!("{}", fallback.text);
            return Ok(());
        }
    };
    if results.is_empty() {
        println!("No relevant documents found.");
    } else {
        print_context(&results, args.show_scores);
    }

    let mut streamed = false;
    let mut stdout = io::stdout();
    let answer = answerer
        .answer_from(question, results, &mut |piece: &str| {
            if !streamed {
                let _ = writeln!(stdout, "Chatbot response:");
                streamed = true;
            }
            let _ = write!(stdout, "{}", piece);
            let _ = stdout.flush();
        })
        .await;

    if streamed {
        println!();
    }
    match answer.outcome {
        AnswerOutcome::Answered => {}
        AnswerOutcome::ModelFailed(reason) if streamed => {
            warn!(%reason, "Answer interrupted");
            println!("{}", answer.text);
        }
        _ => println!("{}", answer.text),
    }
    Ok(())
}

fn read_question<R: BufRead, W: Write>(input: &mut R, output: &mut W) -> Result<String> {
    write!(output, "Ask me a question: ")?;
    output.flush()?;
    let mut line = String::new();
    input
        .read_line(&mut line)
        .context("Failed to read question")?;
    Ok(line.trim().to_string())
}

fn print_context(results: &[RetrievalResult], show_scores: bool) {
    println!("\nUsing retrieved knowledge...\n");
    for result in results {
        if show_scores {
            println!(
                " - [similarity {:.3}, distance {:.3}] {}",
                result.similarity, result.distance, result.text
            );
        } else {
            println!(" - {}", result.text);
        }
    }
    println!();
}

/// Drop the index.
pub fn run_clean(settings: &Settings) -> Result<()> {
    let path = settings.expanded_persist_path();
    if clean_index(&path).context("Failed to remove index")? {
        println!("Removed index at {}", path.display());
    } else {
        info!(path = ?path, "No index to remove");
        println!(
            "Index directory '{}' does not exist, nothing to remove.",
            path.display()
        );
    }
    Ok(())
}

/// Show index state and statistics.
pub fn show_status(settings: &Settings, json: bool) -> Result<()> {
    let path = settings.expanded_persist_path();
    let state = detect_state(&path);

    if state == IndexState::Absent {
        if json {
            println!("{}", serde_json::json!({ "state": state.to_string() }));
        } else {
            println!("Index: absent ({})", path.display());
        }
        return Ok(());
    }

    let index = PersistentIndex::open_read_only(&path).context("Failed to open index")?;
    let stats = index.stats();

    if json {
        let mut value = serde_json::to_value(&stats)?;
        value["state"] = serde_json::Value::String(state.to_string());
        value["path"] = serde_json::Value::String(path.display().to_string());
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    println!("Index: {} ({})", state, path.display());
    println!("  Records: {}", stats.record_count);
    match stats.dimension {
        Some(dim) => println!("  Dimension: {}", dim),
        None => println!("  Dimension: unknown"),
    }
    println!("  Metric: {}", stats.metric);
    println!("  Embedding model: {}", stats.embedding_model);
    println!("  Size on disk: {} bytes", stats.size_bytes);
    println!("  Created: {}", stats.created_at.to_rfc3339());
    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
