//! Configuration loading for the RAG pipeline.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! Default config file lives at ~/.config/grounded-rag/config.toml.
//! Environment variables use the `RAG_` prefix and `__` between nested keys,
//! e.g. `RAG_EMBEDDING__MODEL=nomic-embed-text`.

use config::{Config, Environment, File};
use directories::{BaseDirs, ProjectDirs};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::RagError;
use crate::metric::DistanceMetric;

/// Remote provider flavour for embedding and answering calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    /// Ollama HTTP API (`/api/embed`, `/api/chat`)
    #[default]
    Ollama,
    /// OpenAI-compatible API (`/embeddings`, `/chat/completions`)
    Openai,
}

/// Embedding provider settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingSettings {
    pub provider: ProviderKind,
    /// Model name (e.g. "nomic-embed-text")
    pub model: String,
    /// API base URL
    pub base_url: String,
    /// API key (only needed for hosted providers)
    pub api_key: Option<String>,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Retries after the first failed attempt
    pub max_retries: u32,
    /// Expected vector length; inferred from the first vector when unset
    pub dimension: Option<usize>,
    /// Scale vectors to unit length before indexing
    pub normalize: bool,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            model: "nomic-embed-text".to_string(),
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            timeout_secs: 30,
            max_retries: 1,
            dimension: None,
            normalize: true,
        }
    }
}

/// Answering model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnsweringSettings {
    pub provider: ProviderKind,
    /// Model name (e.g. "llama3.2")
    pub model: String,
    pub base_url: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Stream tokens as they arrive
    pub stream: bool,
}

impl Default for AnsweringSettings {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Ollama,
            model: "llama3.2".to_string(),
            base_url: "http://localhost:11434".to_string(),
            api_key: None,
            timeout_secs: 120,
            max_retries: 1,
            stream: true,
        }
    }
}

/// Chunking strategy selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ChunkStrategyKind {
    #[default]
    Sentence,
    Paragraph,
    Line,
    SlidingWindow,
}

/// Unit used to measure sliding windows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum WindowUnit {
    #[default]
    Characters,
    /// cl100k_base tokens
    Tokens,
}

/// Chunking settings. Only the fields of the selected strategy are read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub strategy: ChunkStrategyKind,
    /// Sentences grouped into one chunk (sentence strategy)
    pub sentences_per_chunk: usize,
    /// Window size in `unit`s (sliding window strategy)
    pub window: usize,
    /// Fraction of each window repeated at the start of the next, in [0, 1)
    pub overlap: f32,
    pub unit: WindowUnit,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            strategy: ChunkStrategyKind::Sentence,
            sentences_per_chunk: 1,
            window: 512,
            overlap: 0.2,
            unit: WindowUnit::Characters,
        }
    }
}

/// Index build settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Chunks per embedding request (32-128 recommended)
    pub batch_size: usize,
    /// Pause between embedding requests, for rate-limited providers
    pub batch_delay_ms: u64,
    /// Embedding requests allowed in flight at once
    pub max_concurrent_batches: usize,
    /// Keep going when a batch fails instead of aborting the build
    pub accept_partial: bool,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            batch_size: 64,
            batch_delay_ms: 0,
            max_concurrent_batches: 1,
            accept_partial: false,
        }
    }
}

/// Query-time retrieval settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Number of nearest chunks to retrieve
    pub top_k: usize,
    /// Drop hits whose similarity falls below this value
    pub min_similarity: Option<f32>,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            top_k: 3,
            min_similarity: None,
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Directory holding the persisted vector index
    #[serde(default = "default_persist_path")]
    pub persist_path: String,

    /// Corpus file or directory read by `build`
    #[serde(default = "default_corpus_path")]
    pub corpus_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Distance metric for newly built indexes
    #[serde(default)]
    pub metric: DistanceMetric,

    #[serde(default)]
    pub embedding: EmbeddingSettings,

    #[serde(default)]
    pub answering: AnsweringSettings,

    #[serde(default)]
    pub chunking: ChunkingSettings,

    #[serde(default)]
    pub build: BuildSettings,

    #[serde(default)]
    pub retrieval: RetrievalSettings,
}

fn default_persist_path() -> String {
    ProjectDirs::from("", "", "grounded-rag")
        .map(|p| p.data_local_dir().join("index"))
        .unwrap_or_else(|| PathBuf::from("./rag-index"))
        .to_string_lossy()
        .to_string()
}

fn default_corpus_path() -> String {
    "docs/cat-facts.txt".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            persist_path: default_persist_path(),
            corpus_path: default_corpus_path(),
            log_level: default_log_level(),
            metric: DistanceMetric::default(),
            embedding: EmbeddingSettings::default(),
            answering: AnsweringSettings::default(),
            chunking: ChunkingSettings::default(),
            build: BuildSettings::default(),
            retrieval: RetrievalSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/grounded-rag/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (RAG_*)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, RagError> {
        let config_dir = ProjectDirs::from("", "", "grounded-rag")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("persist_path", default_persist_path())
            .map_err(|e| RagError::Config(e.to_string()))?
            .set_default("corpus_path", default_corpus_path())
            .map_err(|e| RagError::Config(e.to_string()))?
            .set_default("log_level", default_log_level())
            .map_err(|e| RagError::Config(e.to_string()))?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // RAG_PERSIST_PATH, RAG_EMBEDDING__MODEL, RAG_BUILD__BATCH_SIZE, ...
        builder = builder.add_source(
            Environment::with_prefix("RAG")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder
            .build()
            .map_err(|e| RagError::Config(e.to_string()))?;

        let settings: Settings = config
            .try_deserialize()
            .map_err(|e| RagError::Config(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<(), RagError> {
        if self.build.batch_size == 0 || self.build.batch_size > 1024 {
            return Err(RagError::Config(format!(
                "build.batch_size must be 1-1024, got {}",
                self.build.batch_size
            )));
        }
        if self.build.max_concurrent_batches == 0 {
            return Err(RagError::Config(
                "build.max_concurrent_batches must be > 0".to_string(),
            ));
        }
        if self.retrieval.top_k == 0 {
            return Err(RagError::Config("retrieval.top_k must be > 0".to_string()));
        }
        if let Some(min) = self.retrieval.min_similarity {
            if !(min > 0.0 && min <= 1.0) {
                return Err(RagError::Config(format!(
                    "retrieval.min_similarity must be in (0, 1], got {}",
                    min
                )));
            }
        }
        if !(0.0..1.0).contains(&self.chunking.overlap) {
            return Err(RagError::Config(format!(
                "chunking.overlap must be in [0, 1), got {}",
                self.chunking.overlap
            )));
        }
        if self.chunking.sentences_per_chunk == 0 || self.chunking.window == 0 {
            return Err(RagError::Config(
                "chunking.sentences_per_chunk and chunking.window must be > 0".to_string(),
            ));
        }
        if self.embedding.dimension == Some(0) {
            return Err(RagError::Config(
                "embedding.dimension must be > 0 when set".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the batch size sits outside the recommended 32-128 range.
    pub fn batch_size_outside_recommended(&self) -> bool {
        !(32..=128).contains(&self.build.batch_size)
    }

    /// Expand ~ in persist_path to the home directory
    pub fn expanded_persist_path(&self) -> PathBuf {
        expand_home(&self.persist_path)
    }

    /// Expand ~ in corpus_path to the home directory
    pub fn expanded_corpus_path(&self) -> PathBuf {
        expand_home(&self.corpus_path)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(dirs) = BaseDirs::new() {
            return dirs.home_dir().join(rest);
        }
    }
    PathBuf::from(path)
}
