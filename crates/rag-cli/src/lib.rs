//! `rag` command line library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (build, ask, clean, status)
//! - `prompt`: Interactive skip / rebuild / incremental prompt

pub mod cli;
pub mod commands;
pub mod prompt;

pub use cli::{AskArgs, BuildArgs, Cli, Commands};
pub use commands::{
    init_logging, load_settings, run_ask, run_build, run_clean, show_status,
};
pub use prompt::{ask_decision, InteractivePrompt};
