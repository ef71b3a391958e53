//! Grounded RAG command line.
//!
//! # Usage
//!
//! ```bash
//! rag build [--corpus PATH] [--force | --skip | --incremental]
//! rag ask [QUESTION] [-k N] [--min-similarity S] [--show-scores]
//! rag clean
//! rag status [--json]
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/grounded-rag/config.toml)
//! 3. Environment variables (RAG_*)
//! 4. CLI flags

use anyhow::Result;
use clap::Parser;

use rag_cli::{
    init_logging, load_settings, run_ask, run_build, run_clean, show_status, Cli, Commands,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings = load_settings(
        cli.config.as_deref(),
        cli.log_level.as_deref(),
        cli.persist_path.as_deref(),
    )?;
    init_logging(&settings.log_level)?;

    match cli.command {
        Commands::Build(args) => {
            run_build(settings, args).await?;
        }
        Commands::Ask(args) => {
            run_ask(settings, args).await?;
        }
        Commands::Clean => {
            run_clean(&settings)?;
        }
        Commands::Status { json } => {
            show_status(&settings, json)?;
        }
    }

    Ok(())
}
