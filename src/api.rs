//! Generative-text backend adapters with exponential backoff retry logic.
//!
//! This module provides interchangeable integrations with OpenAI-compatible
//! completion services. Each adapter resolves the service's reply into a
//! [`Completion`] at its boundary, so downstream parsing only ever sees text.
//!
//! # Architecture
//!
//! - [`CompletionBackend`]: Core trait defining one async completion call
//! - [`ChatClientBackend`]: `/chat/completions`, structured replies
//! - [`DirectCompletionBackend`]: `/completions`, structured or raw text replies
//! - [`RetryAsk`]: Decorator that adds retry logic to any backend
//!
//! # Retry Strategy
//!
//! - Configurable retry count (`analysis.max_retries`, default 0)
//! - Exponential backoff from `analysis.retry_base_delay_ms`
//! - Maximum delay capped at 30 seconds
//! - Random jitter (0-250ms) added to prevent thundering herd

use crate::config::{AnalysisConfig, BackendConfig, BackendKind};
use crate::error::BackendError;
use async_trait::async_trait;
use rand::{Rng, rng};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration as StdDuration, Instant};
use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

/// A backend reply, resolved once at the adapter boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    /// An OpenAI-style completion object.
    Structured(ChatCompletion),
    /// A bare string reply.
    RawText(String),
}

impl Completion {
    /// The reply text. A structured completion without choices is empty.
    pub fn into_text(self) -> String {
        match self {
            Completion::RawText(text) => text,
            Completion::Structured(completion) => completion
                .choices
                .into_iter()
                .next()
                .map(|c| c.message.content)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatCompletion {
    #[serde(default)]
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatChoice {
    pub message: ChatReply,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatReply {
    #[serde(default)]
    pub content: String,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct TextCompletion {
    choices: Vec<TextChoice>,
}

#[derive(Deserialize)]
struct TextChoice {
    text: String,
}

/// One concrete integration path to a completion service.
///
/// Implementors send a prompt to a model and return the reply, or an error
/// if the call failed. Object safe so backends can be tried in order.
#[async_trait]
pub trait CompletionBackend: Send + Sync + fmt::Debug {
    /// Name shown in diagnostics.
    fn name(&self) -> &str;

    async fn complete(&self, model: &str, prompt: &str) -> Result<Completion, BackendError>;
}

/// Wrapper that adds exponential backoff retry logic to any [`CompletionBackend`].
///
/// The delay between retries follows this formula:
/// ```text
/// delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
/// ```
pub struct RetryAsk<T> {
    /// The underlying backend to wrap.
    inner: T,
    /// Maximum number of retry attempts before giving up.
    max_retries: usize,
    /// Initial delay between retries (doubles with each attempt).
    base_delay: StdDuration,
    /// Maximum delay cap to prevent excessive waiting.
    max_delay: StdDuration,
}

impl<T> RetryAsk<T>
where
    T: CompletionBackend,
{
    pub fn new(inner: T, max_retries: usize, base_delay: StdDuration) -> Self {
        Self {
            inner,
            max_retries,
            base_delay,
            max_delay: StdDuration::from_secs(30),
        }
    }

    fn backoff(&self, attempt: usize) -> StdDuration {
        let shift = (attempt - 1).min(16) as u32;
        let delay = self.base_delay.saturating_mul(1 << shift).min(self.max_delay);
        let jitter_ms: u64 = rng().random_range(0..=250);
        delay + StdDuration::from_millis(jitter_ms)
    }
}

impl<T: fmt::Debug> fmt::Debug for RetryAsk<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryAsk")
            .field("inner", &self.inner)
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .finish()
    }
}

#[async_trait]
impl<T> CompletionBackend for RetryAsk<T>
where
    T: CompletionBackend,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    #[instrument(level = "info", skip_all, fields(model = %model))]
    async fn complete(&self, model: &str, prompt: &str) -> Result<Completion, BackendError> {
        let total_t0 = Instant::now();
        let mut attempt = 0usize;

        loop {
            let attempt_t0 = Instant::now();
            match self.inner.complete(model, prompt).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    attempt += 1;
                    let attempt_dt = attempt_t0.elapsed();
                    let total_dt = total_t0.elapsed();

                    if attempt > self.max_retries {
                        error!(
                            backend = self.inner.name(),
                            attempt,
                            max = self.max_retries,
                            elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                            elapsed_ms_total = total_dt.as_millis() as u64,
                            error = %e,
                            "complete() exhausted retries"
                        );
                        return Err(e);
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        backend = self.inner.name(),
                        attempt,
                        max = self.max_retries,
                        elapsed_ms_attempt = attempt_dt.as_millis() as u64,
                        ?delay,
                        error = %e,
                        "complete() attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

async fn post_json<B: Serialize + ?Sized>(
    client: &Client,
    url: &str,
    api_key: Option<&str>,
    body: &B,
) -> Result<String, BackendError> {
    let mut request = client.post(url).json(body);
    if let Some(key) = api_key {
        request = request.bearer_auth(key);
    }
    let response = request.send().await?;
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(BackendError::Status {
            status,
            body: crate::utils::truncate_for_log(&text, 200),
        });
    }
    Ok(text)
}

/// Client-style adapter for `POST {api_base}/chat/completions`.
pub struct ChatClientBackend {
    name: String,
    client: Client,
    api_base: String,
    api_key: Option<String>,
}

impl ChatClientBackend {
    pub fn new(name: impl Into<String>, client: Client, api_base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            name: name.into(),
            client,
            api_base: api_base.into(),
            api_key,
        }
    }
}

impl fmt::Debug for ChatClientBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatClientBackend")
            .field("name", &self.name)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl CompletionBackend for ChatClientBackend {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(level = "info", skip_all, fields(model = %model))]
    async fn complete(&self, model: &str, prompt: &str) -> Result<Completion, BackendError> {
        let t0 = Instant::now();
        let request = ChatRequest {
            model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
        };
        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));
        let body = post_json(&self.client, &url, self.api_key.as_deref(), &request).await?;
        let completion: ChatCompletion =
            serde_json::from_str(&body).map_err(|e| BackendError::Malformed(e.to_string()))?;
        info!(backend = %self.name, elapsed_ms = t0.elapsed().as_millis() as u64, "Chat completion received");
        Ok(Completion::Structured(completion))
    }
}

/// Lower-level adapter for `POST {api_base}/completions`.
///
/// Services behind this path answer either with a completion object or with
/// the generated text as the whole body; both resolve to
/// [`Completion::RawText`].
pub struct DirectCompletionBackend {
    name: String,
    client: Client,
    api_base: String,
    api_key: Option<String>,
}

impl DirectCompletionBackend {
    pub fn new(name: impl Into<String>, client: Client, api_base: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            name: name.into(),
            client,
            api_base: api_base.into(),
            api_key,
        }
    }
}

impl fmt::Debug for DirectCompletionBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DirectCompletionBackend")
            .field("name", &self.name)
            .field("api_base", &self.api_base)
            .field("api_key", &self.api_key.as_deref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl CompletionBackend for DirectCompletionBackend {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(level = "info", skip_all, fields(model = %model))]
    async fn complete(&self, model: &str, prompt: &str) -> Result<Completion, BackendError> {
        let t0 = Instant::now();
        let url = format!("{}/completions", self.api_base.trim_end_matches('/'));
        let body = post_json(
            &self.client,
            &url,
            self.api_key.as_deref(),
            &CompletionRequest { model, prompt },
        )
        .await?;
        let text = match serde_json::from_str::<TextCompletion>(&body) {
            Ok(parsed) => parsed
                .choices
                .into_iter()
                .next()
                .map(|c| c.text)
                .unwrap_or_default(),
            Err(_) => body,
        };
        info!(backend = %self.name, elapsed_ms = t0.elapsed().as_millis() as u64, "Direct completion received");
        Ok(Completion::RawText(text))
    }
}

/// Build the configured backends in order, each wrapped in [`RetryAsk`].
pub fn build_backends(config: &AnalysisConfig) -> Result<Vec<Box<dyn CompletionBackend>>, BackendError> {
    let client = Client::builder().build()?;
    let base_delay = StdDuration::from_millis(config.retry_base_delay_ms);

    let backends = config
        .backends
        .iter()
        .map(|b: &BackendConfig| -> Box<dyn CompletionBackend> {
            let key = b.resolved_api_key();
            match b.kind {
                BackendKind::Chat => Box::new(RetryAsk::new(
                    ChatClientBackend::new(b.name.clone(), client.clone(), b.api_base.clone(), key),
                    config.max_retries,
                    base_delay,
                )),
                BackendKind::Completion => Box::new(RetryAsk::new(
                    DirectCompletionBackend::new(b.name.clone(), client.clone(), b.api_base.clone(), key),
                    config.max_retries,
                    base_delay,
                )),
            }
        })
        .collect();
    Ok(backends)
}
