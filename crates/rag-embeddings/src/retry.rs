//! Provider call plumbing shared by the embedding and answering clients.
//!
//! Both clients retry the same failures (transport errors, timeouts, 429
//! and 5xx) and report rejections with the same remediation hints.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use backoff::{backoff::Backoff, ExponentialBackoff};
use reqwest::StatusCode;
use tracing::{error, warn};

use rag_types::ProviderKind;

/// Longest slice of an error body carried into an error message.
pub const MAX_ERROR_BODY: usize = 200;

/// How often and how fast to retry a provider call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure
    pub max_retries: u32,
    /// First backoff interval between attempts
    pub interval: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, interval: Duration) -> Self {
        Self {
            max_retries,
            interval,
        }
    }

    fn backoff(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            current_interval: self.interval,
            initial_interval: self.interval,
            max_elapsed_time: None,
            ..Default::default()
        }
    }
}

/// Run `call` until it succeeds, fails with a non-retryable error, or the
/// policy runs out of attempts. `call` receives the 1-based attempt number.
pub async fn retry_with_backoff<T, E, F, Fut>(
    policy: RetryPolicy,
    what: &str,
    is_retryable: impl Fn(&E) -> bool,
    mut call: F,
) -> Result<T, E>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut backoff = policy.backoff();
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;

        match call(attempts).await {
            Ok(value) => return Ok(value),
            Err(e) if !is_retryable(&e) => return Err(e),
            Err(e) => {
                if attempts > policy.max_retries {
                    error!(error = %e, attempts, what, "Max retries exceeded");
                    return Err(e);
                }

                match backoff.next_backoff() {
                    Some(duration) => {
                        warn!(
                            error = %e,
                            retry_in_ms = duration.as_millis(),
                            what,
                            "Provider call failed, retrying"
                        );
                        tokio::time::sleep(duration).await;
                    }
                    None => {
                        error!(error = %e, what, "Backoff exhausted");
                        return Err(e);
                    }
                }
            }
        }
    }
}

/// A non-success HTTP status, classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusFailure {
    /// 429 or 5xx: worth another attempt
    Unavailable(String),
    /// Any other status: resending cannot help
    Rejected { status: u16, message: String },
}

/// Classify a non-success reply and attach a remediation hint where one is known.
pub fn classify_status(
    status: StatusCode,
    body: &str,
    provider: ProviderKind,
    model: &str,
) -> StatusFailure {
    let detail: String = body.chars().take(MAX_ERROR_BODY).collect();

    if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
        return StatusFailure::Unavailable(format!("HTTP {}: {}", status.as_u16(), detail));
    }

    let message = match (status, provider) {
        (StatusCode::NOT_FOUND, ProviderKind::Ollama) => format!(
            "{} (model not found? run `ollama pull {}`)",
            detail, model
        ),
        (StatusCode::UNAUTHORIZED, _) => format!("{} (check the API key)", detail),
        _ => detail,
    };
    StatusFailure::Rejected {
        status: status.as_u16(),
        message,
    }
}

/// Human-readable description of a request that never got a reply.
pub fn transport_message(e: &reqwest::Error, timeout: Duration, base_url: &str) -> String {
    if e.is_timeout() {
        format!("request timed out after {}s", timeout.as_secs_f32())
    } else if e.is_connect() {
        format!("cannot connect to {}; is the server running?", base_url)
    } else {
        e.to_string()
    }
}

/// Provider name used in errors and logs.
pub fn provider_name(provider: ProviderKind) -> &'static str {
    match provider {
        ProviderKind::Ollama => "ollama",
        ProviderKind::Openai => "openai",
    }
}
