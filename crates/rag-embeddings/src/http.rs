//! HTTP embedding providers (Ollama and OpenAI-compatible).
//!
//! Every request runs with a bounded timeout. Transport failures, timeouts,
//! rate limits and server errors are retried with exponential backoff up to
//! `max_retries` extra attempts. Rejections (4xx) and normalization failures
//! are returned immediately: resending the same texts cannot fix them.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use rag_types::{EmbeddingSettings, ProviderKind};

use crate::error::EmbeddingError;
use crate::model::{Embedding, EmbeddingProvider, ProviderInfo};
use crate::normalizer::ResponseNormalizer;
use crate::retry::{
    classify_status, provider_name, retry_with_backoff, transport_message, RetryPolicy,
    StatusFailure,
};

/// Configuration for an HTTP embedding provider.
#[derive(Debug, Clone)]
pub struct HttpEmbedderConfig {
    pub provider: ProviderKind,
    /// Base URL without trailing path (e.g. "http://localhost:11434")
    pub base_url: String,
    /// Embedding model name
    pub model: String,
    /// Bearer token (OpenAI-compatible servers)
    pub api_key: Option<SecretString>,
    /// Per-request timeout
    pub timeout: Duration,
    /// Extra attempts after the first failure
    pub max_retries: u32,
    /// First backoff interval between attempts
    pub retry_interval: Duration,
    /// Expected vector length, if known up front
    pub dimension: Option<usize>,
    /// Scale vectors to unit length
    pub normalize: bool,
}

impl HttpEmbedderConfig {
    /// Local Ollama server with default settings.
    pub fn ollama(model: impl Into<String>) -> Self {
        Self {
            provider: ProviderKind::Ollama,
            base_url: "http://localhost:11434".to_string(),
            model: model.into(),
            api_key: None,
            timeout: Duration::from_secs(30),
            max_retries: 1,
            retry_interval: Duration::from_millis(500),
            dimension: None,
            normalize: true,
        }
    }

    /// OpenAI embeddings API.
    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: ProviderKind::Openai,
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            api_key: Some(SecretString::from(api_key.into())),
            ..Self::ollama("")
        }
    }

    pub fn from_settings(settings: &EmbeddingSettings) -> Self {
        Self {
            provider: settings.provider,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone().map(SecretString::from),
            timeout: Duration::from_secs(settings.timeout_secs),
            max_retries: settings.max_retries,
            retry_interval: Duration::from_millis(500),
            dimension: settings.dimension,
            normalize: settings.normalize,
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, retry_interval: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_interval = retry_interval;
        self
    }

    pub fn with_dimension(mut self, dimension: Option<usize>) -> Self {
        self.dimension = dimension;
        self
    }

    fn endpoint(&self) -> String {
        match self.provider {
            ProviderKind::Ollama => format!("{}/api/embed", self.base_url),
            ProviderKind::Openai => format!("{}/embeddings", self.base_url),
        }
    }
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

/// Embedding provider speaking the Ollama or OpenAI embeddings protocol.
pub struct HttpEmbedder {
    client: Client,
    config: HttpEmbedderConfig,
    info: ProviderInfo,
    /// Dimension observed on the first successful reply
    observed_dimension: OnceLock<usize>,
}

impl HttpEmbedder {
    pub fn new(config: HttpEmbedderConfig) -> Result<Self, EmbeddingError> {
        if config.model.trim().is_empty() {
            return Err(EmbeddingError::Config(
                "embedding model name is empty".to_string(),
            ));
        }
        if config.provider == ProviderKind::Openai && config.api_key.is_none() {
            warn!("OpenAI-compatible embedding provider configured without an API key");
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EmbeddingError::Config(e.to_string()))?;

        let info = ProviderInfo {
            provider: provider_name(config.provider).to_string(),
            model: config.model.clone(),
        };

        Ok(Self {
            client,
            config,
            info,
            observed_dimension: OnceLock::new(),
        })
    }

    /// Dimension reported so far (configured or observed).
    pub fn dimension(&self) -> Option<usize> {
        self.config
            .dimension
            .or_else(|| self.observed_dimension.get().copied())
    }

    fn normalizer(&self) -> ResponseNormalizer {
        ResponseNormalizer::new()
            .with_expected_dimension(self.dimension())
            .with_unit_length(self.config.normalize)
    }

    /// Call the provider with retry logic.
    async fn call_api(&self, texts: &[String]) -> Result<Value, EmbeddingError> {
        let policy = RetryPolicy::new(self.config.max_retries, self.config.retry_interval);
        retry_with_backoff(policy, "embedding", EmbeddingError::is_retryable, |attempt| {
            debug!(
                attempt,
                batch = texts.len(),
                model = %self.config.model,
                "Calling embedding API"
            );
            self.make_request(texts)
        })
        .await
    }

    /// Make a single request and decode the body as JSON.
    async fn make_request(&self, texts: &[String]) -> Result<Value, EmbeddingError> {
        let request = EmbedRequest {
            model: &self.config.model,
            input: texts,
        };

        let mut builder = self
            .client
            .post(self.config.endpoint())
            .header("Content-Type", "application/json")
            .json(&request);
        if let Some(key) = &self.config.api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key.expose_secret()));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.status_error(status, &body));
        }

        let body = response.text().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_str(&body).map_err(|_| EmbeddingError::MalformedEmbeddingResponse {
            shape: format!("non-JSON body ({} bytes)", body.len()),
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> EmbeddingError {
        EmbeddingError::ProviderUnavailable {
            provider: self.info.provider.clone(),
            message: transport_message(&e, self.config.timeout, &self.config.base_url),
        }
    }

    fn status_error(&self, status: StatusCode, body: &str) -> EmbeddingError {
        let provider = self.info.provider.clone();
        match classify_status(status, body, self.config.provider, &self.config.model) {
            StatusFailure::Unavailable(message) => {
                EmbeddingError::ProviderUnavailable { provider, message }
            }
            StatusFailure::Rejected { status, message } => EmbeddingError::ProviderRejected {
                provider,
                status,
                message,
            },
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbedder {
    fn info(&self) -> &ProviderInfo {
        &self.info
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let reply = self.call_api(texts).await?;
        let embeddings = self.normalizer().normalize(&reply, texts.len())?;

        if let Some(first) = embeddings.first() {
            let dim = first.dimension();
            if self.observed_dimension.set(dim).is_ok() {
                debug!(dimension = dim, model = %self.config.model, "Locked embedding dimension");
            }
        }

        Ok(embeddings)
    }
}
