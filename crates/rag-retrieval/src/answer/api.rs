//! HTTP answering models (Ollama chat and OpenAI-compatible chat completions).
//!
//! Requests are retried with exponential backoff until the first byte of
//! the answer arrives. Once streaming has started a failure is returned as
//! is, since part of the answer may already have reached the sink.

use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use rag_embeddings::{
    classify_status, provider_name, retry_with_backoff, transport_message, RetryPolicy,
    StatusFailure,
};
use rag_types::{AnsweringSettings, ProviderKind};

use super::{AnsweringError, AnsweringModel, TokenSink};
use crate::prompt::GroundedPrompt;

/// Configuration for an HTTP answering model.
#[derive(Debug, Clone)]
pub struct ApiAnsweringConfig {
    pub provider: ProviderKind,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<SecretString>,
    /// Bound on the whole request, body included
    pub timeout: Duration,
    /// Extra attempts after the first failure
    pub max_retries: u32,
    pub retry_interval: Duration,
    /// Ask the server to stream (Ollama only)
    pub stream: bool,
}

impl ApiAnsweringConfig {
    pub fn ollama(model: impl Into<String>) -> Self {
        Self {
            provider: ProviderKind::Ollama,
            base_url: "http://localhost:11434".to_string(),
            model: model.into(),
            api_key: None,
            timeout: Duration::from_secs(120),
            max_retries: 1,
            retry_interval: Duration::from_millis(500),
            stream: true,
        }
    }

    pub fn openai(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: ProviderKind::Openai,
            base_url: "https://api.openai.com/v1".to_string(),
            model: model.into(),
            api_key: Some(SecretString::from(api_key.into())),
            stream: false,
            ..Self::ollama("")
        }
    }

    pub fn from_settings(settings: &AnsweringSettings) -> Self {
        Self {
            provider: settings.provider,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone().map(SecretString::from),
            timeout: Duration::from_secs(settings.timeout_secs),
            max_retries: settings.max_retries,
            retry_interval: Duration::from_millis(500),
            stream: settings.stream,
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

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    fn endpoint(&self) -> String {
        match self.provider {
            ProviderKind::Ollama => format!("{}/api/chat", self.base_url),
            ProviderKind::Openai => format!("{}/chat/completions", self.base_url),
        }
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

/// Answering model backed by a chat API.
pub struct ApiAnsweringModel {
    client: Client,
    config: ApiAnsweringConfig,
}

impl ApiAnsweringModel {
    pub fn new(config: ApiAnsweringConfig) -> Result<Self, AnsweringError> {
        if config.model.trim().is_empty() {
            return Err(AnsweringError::Config(
                "answering model name is empty".to_string(),
            ));
        }
        if config.provider == ProviderKind::Openai && config.api_key.is_none() {
            warn!("OpenAI-compatible answering model configured without an API key");
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AnsweringError::Config(e.to_string()))?;

        Ok(Self { client, config })
    }

    fn request<'a>(&'a self, prompt: &'a GroundedPrompt, stream: bool) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.question,
                },
            ],
            stream,
        }
    }

    /// Send with retry logic; returns the successful response unread.
    async fn call_api(&self, request: &ChatRequest<'_>) -> Result<Response, AnsweringError> {
        let policy = RetryPolicy::new(self.config.max_retries, self.config.retry_interval);
        retry_with_backoff(policy, "answering", AnsweringError::is_retryable, |attempt| {
            debug!(
                attempt,
                model = %self.config.model,
                stream = request.stream,
                "Calling answering API"
            );
            self.make_request(request)
        })
        .await
    }

    async fn make_request(&self, request: &ChatRequest<'_>) -> Result<Response, AnsweringError> {
        let mut builder = self
            .client
            .post(self.config.endpoint())
            .header("Content-Type", "application/json")
            .json(request);
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
        Ok(response)
    }

    fn transport_error(&self, e: reqwest::Error) -> AnsweringError {
        AnsweringError::Unavailable {
            provider: provider_name(self.config.provider).to_string(),
            message: transport_message(&e, self.config.timeout, &self.config.base_url),
        }
    }

    fn status_error(&self, status: StatusCode, body: &str) -> AnsweringError {
        let provider = provider_name(self.config.provider).to_string();
        match classify_status(status, body, self.config.provider, &self.config.model) {
            StatusFailure::Unavailable(message) => AnsweringError::Unavailable { provider, message },
            StatusFailure::Rejected { status, message } => AnsweringError::Rejected {
                provider,
                status,
                message,
            },
        }
    }

    /// Read an NDJSON chat stream, forwarding each piece of content.
    async fn read_stream(
        &self,
        response: Response,
        sink: TokenSink<'_>,
    ) -> Result<String, AnsweringError> {
        let mut answer = String::new();
        let mut pending: Vec<u8> = Vec::new();
        let mut body = response.bytes_stream();

        while let Some(bytes) = body.next().await {
            let bytes = bytes.map_err(|e| self.transport_error(e))?;
            pending.extend_from_slice(&bytes);

            while let Some(pos) = pending.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = pending.drain(..=pos).collect();
                if let Some(piece) = parse_stream_line(&line)? {
                    sink(&piece);
                    answer.push_str(&piece);
                }
            }
        }
        if let Some(piece) = parse_stream_line(&pending)? {
            sink(&piece);
            answer.push_str(&piece);
        }

        Ok(answer)
    }
}

/// Content carried by one NDJSON line, if any.
fn parse_stream_line(line: &[u8]) -> Result<Option<String>, AnsweringError> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let value: Value = serde_json::from_str(line)
        .map_err(|e| AnsweringError::Parse(format!("invalid stream line: {}", e)))?;
    if let Some(message) = value.get("error").and_then(Value::as_str) {
        return Err(AnsweringError::Model(message.to_string()));
    }
    Ok(value
        .pointer("/message/content")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string))
}

/// Answer text from a complete (non-streamed) reply.
fn parse_complete(provider: ProviderKind, value: &Value) -> Result<String, AnsweringError> {
    if let Some(message) = value.get("error") {
        let message = message
            .get("message")
            .and_then(Value::as_str)
            .or_else(|| message.as_str())
            .unwrap_or("unknown error");
        return Err(AnsweringError::Model(message.to_string()));
    }

    let pointer = match provider {
        ProviderKind::Ollama => "/message/content",
        ProviderKind::Openai => "/choices/0/message/content",
    };
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| AnsweringError::Parse(format!("missing {}", pointer)))
}

#[async_trait]
impl AnsweringModel for ApiAnsweringModel {
    fn name(&self) -> &str {
        &self.config.model
    }

    async fn answer(&self, prompt: &GroundedPrompt) -> Result<String, AnsweringError> {
        let request = self.request(prompt, false);
        let response = self.call_api(&request).await?;
        let body = response
            .text()
            .await
            .map_err(|e| self.transport_error(e))?;
        let value: Value = serde_json::from_str(&body)
            .map_err(|_| AnsweringError::Parse(format!("non-JSON body ({} bytes)", body.len())))?;
        parse_complete(self.config.provider, &value)
    }

    async fn answer_streaming(
        &self,
        prompt: &GroundedPrompt,
        sink: TokenSink<'_>,
    ) -> Result<String, AnsweringError> {
        // OpenAI-compatible servers stream server-sent events; answered whole.
        if !self.config.stream || self.config.provider != ProviderKind::Ollama {
            let text = self.answer(prompt).await?;
            sink(&text);
            return Ok(text);
        }

        let request = self.request(prompt, true);
        let response = self.call_api(&request).await?;
        self.read_stream(response, sink).await
    }
}
