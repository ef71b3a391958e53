//! CLI argument parsing for `rag`.
//!
//! CLI flags override every other configuration source.

use clap::{Args, Parser, Subcommand};

/// Grounded retrieval-augmented question answering
///
/// Builds a vector index from a text corpus and answers questions using
/// only the retrieved context.
#[derive(Parser, Debug)]
#[command(name = "rag")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/grounded-rag/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override the index directory
    #[arg(long, global = true)]
    pub persist_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Chunk, embed and persist the corpus
    Build(BuildArgs),

    /// Answer a question from the indexed corpus
    Ask(AskArgs),

    /// Delete the persisted index
    Clean,

    /// Show index state and statistics
    Status {
        /// Print statistics as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Corpus file or directory (overrides `corpus_path`)
    #[arg(long)]
    pub corpus: Option<String>,

    /// Rebuild a populated index without asking
    #[arg(short, long, conflicts_with_all = ["skip", "incremental"])]
    pub force: bool,

    /// Keep a populated index without asking
    #[arg(long, conflicts_with = "incremental")]
    pub skip: bool,

    /// Embed only documents the index does not hold yet
    #[arg(long)]
    pub incremental: bool,

    /// Chunks per embedding request
    #[arg(long)]
    pub batch_size: Option<usize>,

    /// Skip failed batches instead of aborting the build
    #[arg(long)]
    pub accept_partial: bool,
}

#[derive(Args, Debug, Clone, Default)]
pub struct AskArgs {
    /// Question to answer; read from stdin when omitted
    pub question: Vec<String>,

    /// Number of chunks to retrieve
    #[arg(short, long)]
    pub k: Option<usize>,

    /// Drop chunks scoring below this similarity
    #[arg(long)]
    pub min_similarity: Option<f32>,

    /// Print distance and similarity next to each retrieved chunk
    #[arg(long)]
    pub show_scores: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_build_force() {
        let cli = Cli::parse_from(["rag", "build", "--force", "--corpus", "docs"]);
        match cli.command {
            Commands::Build(args) => {
                assert!(args.force);
                assert_eq!(args.corpus.as_deref(), Some("docs"));
            }
            _ => panic!("Expected Build command"),
        }
    }

    #[test]
    fn test_cli_build_flags_conflict() {
        assert!(Cli::try_parse_from(["rag", "build", "--force", "--skip"]).is_err());
        assert!(Cli::try_parse_from(["rag", "build", "--skip", "--incremental"]).is_err());
    }

    #[test]
    fn test_cli_ask_question_words() {
        let cli = Cli::parse_from([
            "rag",
            "ask",
            "How",
            "much",
            "do",
            "cats",
            "sleep?",
            "-k",
            "1",
            "--show-scores",
        ]);
        match cli.command {
            Commands::Ask(args) => {
                assert_eq!(args.question.join(" "), "How much do cats sleep?");
                assert_eq!(args.k, Some(1));
                assert!(args.show_scores);
            }
            _ => panic!("Expected Ask command"),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "rag",
            "status",
            "--log-level",
            "debug",
            "--persist-path",
            "/tmp/idx",
        ]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.persist_path.as_deref(), Some("/tmp/idx"));
        assert!(matches!(cli.command, Commands::Status { json: false }));
    }

    #[test]
    fn test_cli_clean() {
        let cli = Cli::parse_from(["rag", "clean"]);
        assert!(matches!(cli.command, Commands::Clean));
    }
}
