//! Article analysis across an ordered set of completion backends.
//!
//! [`BackendRegistry`] owns the backends together with their process-lifetime
//! enabled flags and the last-used-model bookkeeping read by the diagnostics
//! view. [`Analyzer`] builds the prompt, walks the registry and decodes the
//! reply. Analysis never returns an error: an exhausted registry yields
//! [`Enrichment::unavailable`], any other failure [`Enrichment::failed`].

use crate::api::{CompletionBackend, build_backends};
use crate::config::AnalysisConfig;
use crate::error::{AnalysisError, BackendError};
use crate::models::{AiStatus, BackendStatus, Enrichment};
use crate::parser::parse_response;
use crate::utils::truncate_for_log;
use std::sync::RwLock;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, info, instrument, warn};

struct BackendSlot {
    backend: Box<dyn CompletionBackend>,
    enabled: AtomicBool,
}

/// Backends in preference order, each disabled for good after a failure.
pub struct BackendRegistry {
    slots: Vec<BackendSlot>,
    models: Vec<String>,
    last_used_model: RwLock<String>,
    available_models: RwLock<Vec<String>>,
}

impl BackendRegistry {
    pub fn new(backends: Vec<Box<dyn CompletionBackend>>, models: Vec<String>) -> Self {
        Self {
            slots: backends
                .into_iter()
                .map(|backend| BackendSlot {
                    backend,
                    enabled: AtomicBool::new(true),
                })
                .collect(),
            models,
            last_used_model: RwLock::new("Unknown".to_string()),
            available_models: RwLock::new(Vec::new()),
        }
    }

    pub fn from_config(config: &AnalysisConfig) -> Result<Self, BackendError> {
        Ok(Self::new(build_backends(config)?, config.models.clone()))
    }

    /// Pick the first model from the pool and record it, whether or not the
    /// call that follows succeeds.
    fn select_model(&self) -> Result<String, AnalysisError> {
        let model = self.models.first().cloned().ok_or(AnalysisError::NoModels)?;
        if let Ok(mut available) = self.available_models.write() {
            *available = self.models.clone();
        }
        if let Ok(mut last) = self.last_used_model.write() {
            *last = model.clone();
        }
        Ok(model)
    }

    /// Ask each enabled backend in turn until one gives a non-empty reply.
    ///
    /// A backend that errors is disabled; one that answers with empty text is
    /// skipped but stays enabled.
    async fn complete(&self, model: &str, prompt: &str) -> Option<String> {
        for slot in &self.slots {
            if !slot.enabled.load(Ordering::Relaxed) {
                continue;
            }
            let name = slot.backend.name();
            match slot.backend.complete(model, prompt).await {
                Ok(completion) => {
                    let text = completion.into_text();
                    if text.trim().is_empty() {
                        warn!(backend = name, "Backend returned an empty reply; trying next");
                        continue;
                    }
                    info!(backend = name, "Backend answered");
                    return Some(text);
                }
                Err(e) => {
                    slot.enabled.store(false, Ordering::Relaxed);
                    warn!(backend = name, error = %e, "Backend failed; disabled for this process");
                }
            }
        }
        None
    }

    /// Current backend flags and model bookkeeping.
    pub fn status(&self) -> AiStatus {
        AiStatus {
            backends: self
                .slots
                .iter()
                .map(|slot| BackendStatus {
                    name: slot.backend.name().to_string(),
                    enabled: slot.enabled.load(Ordering::Relaxed),
                })
                .collect(),
            last_used_model: self
                .last_used_model
                .read()
                .map(|m| m.clone())
                .unwrap_or_default(),
            available_models: self
                .available_models
                .read()
                .map(|m| m.clone())
                .unwrap_or_default(),
        }
    }
}

/// Prompt requesting the six enrichment fields as JSON.
pub fn build_prompt(title: &str, content: &str) -> String {
    format!(
        r#"You are a professional news summarizer and analyst with a great sense of humor. Below is a news article.
Title: {title}

Content: {content}

Please provide:
1. A funny translation of the news article that makes it easier to understand and more humorous (200-500 characters)
2. A concise 3-5 sentence summary of the article
3. The main topic category (politics, technology, health, etc.)
4. Overall sentiment (positive, negative, or neutral)
5. Key entities mentioned (people, organizations, locations)
6. Core points of the article formatted in markdown, with 3-5 bullet points highlighting the most important information

Format your response as JSON with the following structure:
{{
    "funny_translation": "your humorous simplified version here",
    "summary": "your summary here",
    "topic": "main topic",
    "sentiment": "sentiment",
    "key_entities": ["entity1", "entity2", "entity3"],
    "core_points_markdown": "- First key point\n- Second key point\n- Third key point"
}}"#
    )
}

pub struct Analyzer {
    registry: BackendRegistry,
}

impl Analyzer {
    pub fn new(registry: BackendRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &BackendRegistry {
        &self.registry
    }

    /// Analyze an article. Never fails.
    #[instrument(level = "info", skip(self, content), fields(content_chars = content.chars().count()))]
    pub async fn analyze(&self, title: &str, content: &str) -> Enrichment {
        match self.try_analyze(title, content).await {
            Ok(enrichment) => enrichment,
            Err(e) => {
                error!(error = %e, "Analysis failed before reaching a backend");
                Enrichment::failed(&e.to_string())
            }
        }
    }

    async fn try_analyze(&self, title: &str, content: &str) -> Result<Enrichment, AnalysisError> {
        let model = self.registry.select_model()?;
        debug!(%model, "Selected model");
        let prompt = build_prompt(title, content);

        match self.registry.complete(&model, &prompt).await {
            Some(reply) => {
                debug!(reply = %truncate_for_log(&reply, 300), "Model reply");
                Ok(parse_response(&reply))
            }
            None => {
                warn!("All analysis backends failed; using fallback result");
                Ok(Enrichment::unavailable(title))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Completion;
    use async_trait::async_trait;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    #[derive(Debug, Clone)]
    enum Reply {
        Fail,
        Text(&'static str),
    }

    #[derive(Debug)]
    struct Scripted {
        name: &'static str,
        reply: Reply,
        calls: Arc<AtomicUsize>,
    }

    impl Scripted {
        fn boxed(name: &'static str, reply: Reply) -> (Box<dyn CompletionBackend>, Arc<AtomicUsize>) {
            let calls = Arc::new(AtomicUsize::new(0));
            let backend = Scripted {
                name,
                reply,
                calls: Arc::clone(&calls),
            };
            (Box::new(backend), calls)
        }
    }

    #[async_trait]
    impl CompletionBackend for Scripted {
        fn name(&self) -> &str {
            self.name
        }

        async fn complete(&self, _model: &str, _prompt: &str) -> Result<Completion, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Reply::Fail => Err(BackendError::Malformed("scripted failure".to_string())),
                Reply::Text(t) => Ok(Completion::RawText(t.to_string())),
            }
        }
    }

    fn models() -> Vec<String> {
        vec!["gpt-4o-mini".to_string(), "gemini-2.0-flash".to_string()]
    }

    const GOOD_REPLY: &str = r#"{"summary": "S", "topic": "tech", "sentiment": "positive", "key_entities": ["ACME"]}"#;

    #[tokio::test]
    async fn test_all_backends_failing_yields_fallback() {
        let (a, _) = Scripted::boxed("client", Reply::Fail);
        let (b, _) = Scripted::boxed("direct", Reply::Fail);
        let analyzer = Analyzer::new(BackendRegistry::new(vec![a, b], models()));

        let result = analyzer.analyze("Storm", "content").await;
        assert_eq!(result, Enrichment::unavailable("Storm"));
        assert_eq!(result.topic.as_deref(), Some("Unknown"));
        assert_eq!(result.sentiment.as_deref(), Some("Neutral"));
        assert_eq!(
            result.summary.as_deref(),
            Some("Failed to generate summary for 'Storm'. Unable to connect to AI services.")
        );

        let status = analyzer.registry().status();
        assert!(status.backends.iter().all(|b| !b.enabled));
    }

    #[tokio::test]
    async fn test_failed_backend_stays_disabled() {
        let (a, a_calls) = Scripted::boxed("client", Reply::Fail);
        let (b, b_calls) = Scripted::boxed("direct", Reply::Text(GOOD_REPLY));
        let analyzer = Analyzer::new(BackendRegistry::new(vec![a, b], models()));

        let first = analyzer.analyze("t", "c").await;
        let second = analyzer.analyze("t", "c").await;
        assert_eq!(first.topic.as_deref(), Some("tech"));
        assert_eq!(second.topic.as_deref(), Some("tech"));
        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 2);

        let status = analyzer.registry().status();
        assert_eq!(
            status.backends,
            vec![
                BackendStatus { name: "client".to_string(), enabled: false },
                BackendStatus { name: "direct".to_string(), enabled: true },
            ]
        );
    }

    #[tokio::test]
    async fn test_empty_reply_falls_through_without_disabling() {
        let (a, a_calls) = Scripted::boxed("client", Reply::Text("   "));
        let (b, _) = Scripted::boxed("direct", Reply::Text(GOOD_REPLY));
        let analyzer = Analyzer::new(BackendRegistry::new(vec![a, b], models()));

        analyzer.analyze("t", "c").await;
        analyzer.analyze("t", "c").await;
        assert_eq!(a_calls.load(Ordering::SeqCst), 2);
        assert!(analyzer.registry().status().backends[0].enabled);
    }

    #[tokio::test]
    async fn test_only_empty_replies_yield_fallback() {
        let (a, _) = Scripted::boxed("client", Reply::Text(""));
        let analyzer = Analyzer::new(BackendRegistry::new(vec![a], models()));
        let result = analyzer.analyze("Quiet", "c").await;
        assert_eq!(result, Enrichment::unavailable("Quiet"));
    }

    #[tokio::test]
    async fn test_no_models_yields_error_result() {
        let (a, calls) = Scripted::boxed("client", Reply::Text(GOOD_REPLY));
        let analyzer = Analyzer::new(BackendRegistry::new(vec![a], Vec::new()));
        let result = analyzer.analyze("t", "c").await;
        assert_eq!(result.topic.as_deref(), Some("Error"));
        assert_eq!(result.sentiment.as_deref(), Some("Unknown"));
        assert!(result.summary.unwrap().starts_with("Failed to generate summary. Error: "));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_last_used_model_recorded_even_on_failure() {
        let (a, _) = Scripted::boxed("client", Reply::Fail);
        let analyzer = Analyzer::new(BackendRegistry::new(vec![a], models()));
        assert_eq!(analyzer.registry().status().last_used_model, "Unknown");

        analyzer.analyze("t", "c").await;
        let status = analyzer.registry().status();
        assert_eq!(status.last_used_model, "gpt-4o-mini");
        assert_eq!(status.available_models, models());
    }

    #[test]
    fn test_prompt_embeds_article_and_fields() {
        let prompt = build_prompt("Storm hits coast", "Heavy rain fell.");
        assert!(prompt.contains("Title: Storm hits coast"));
        assert!(prompt.contains("Content: Heavy rain fell."));
        for field in [
            "funny_translation",
            "summary",
            "topic",
            "sentiment",
            "key_entities",
            "core_points_markdown",
        ] {
            assert!(prompt.contains(&format!("\"{}\"", field)));
        }
    }
}
