//! Data models for crawled articles and their enrichments.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Article`]: The persisted record, created unanalyzed at crawl time
//! - [`ArticleUpdate`]: A partial merge applied by the store
//! - [`Headline`]: A discovered headline candidate not yet persisted
//! - [`ExtractedContent`]: Title and body text pulled from an article page
//! - [`Enrichment`]: The structured result decoded from a model reply
//! - [`DebugSnapshot`]: A redacted diagnostics view of the store and backends

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of `summary`, `funny_translation` and `core_points_markdown`.
pub const LONG_FIELD_MAX: usize = 3000;
/// Maximum length of `topic`.
pub const TOPIC_MAX: usize = 50;
/// Maximum length of `sentiment`.
pub const SENTIMENT_MAX: usize = 20;
/// Maximum number of `key_entities`.
pub const MAX_ENTITIES: usize = 15;

/// Placeholder summary stored at crawl time.
pub const PENDING_SUMMARY: &str = "Click to generate summary";

/// A crawled news article as persisted in the store.
///
/// Records are created with `has_summary = false` and enriched exactly once,
/// on first view. `id` is a digest of `url`, see
/// [`crate::scrapers::headlines::article_id`].
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Article {
    pub id: String,
    pub title: String,
    pub url: String,
    pub domain: String,
    pub crawled_at: DateTime<Utc>,
    #[serde(default)]
    pub has_summary: bool,
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub funny_translation: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub sentiment: String,
    #[serde(default)]
    pub key_entities: Vec<String>,
    #[serde(default)]
    pub core_points_markdown: String,
}

impl Article {
    /// Build the unanalyzed record stored at crawl time.
    pub fn unanalyzed(headline: &Headline, title: String, crawled_at: DateTime<Utc>) -> Self {
        Self {
            id: headline.id.clone(),
            title,
            url: headline.url.clone(),
            domain: domain_of(&headline.url),
            crawled_at,
            has_summary: false,
            summary: PENDING_SUMMARY.to_string(),
            funny_translation: String::new(),
            topic: "Unknown".to_string(),
            sentiment: "Unknown".to_string(),
            key_entities: Vec::new(),
            core_points_markdown: String::new(),
        }
    }

    /// Apply a partial update. Only fields set in `update` change.
    pub fn merge(&mut self, update: ArticleUpdate) {
        let ArticleUpdate {
            title,
            has_summary,
            summary,
            funny_translation,
            topic,
            sentiment,
            key_entities,
            core_points_markdown,
        } = update;

        if let Some(v) = title {
            self.title = v;
        }
        // has_summary never reverts
        if has_summary == Some(true) {
            self.has_summary = true;
        }
        if let Some(v) = summary {
            self.summary = v;
        }
        if let Some(v) = funny_translation {
            self.funny_translation = v;
        }
        if let Some(v) = topic {
            self.topic = v;
        }
        if let Some(v) = sentiment {
            self.sentiment = v;
        }
        if let Some(v) = key_entities {
            self.key_entities = v;
        }
        if let Some(v) = core_points_markdown {
            self.core_points_markdown = v;
        }
    }
}

/// Host component of a URL, or an empty string when it has none.
pub fn domain_of(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_default()
}

/// A partial set of article fields for [`crate::store::ArticleStore::update`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ArticleUpdate {
    pub title: Option<String>,
    pub has_summary: Option<bool>,
    pub summary: Option<String>,
    pub funny_translation: Option<String>,
    pub topic: Option<String>,
    pub sentiment: Option<String>,
    pub key_entities: Option<Vec<String>>,
    pub core_points_markdown: Option<String>,
}

impl ArticleUpdate {
    /// True when this update marks the article as enriched.
    pub fn is_enrichment(&self) -> bool {
        self.has_summary == Some(true)
    }
}

/// A discovered headline/link pair with its derived identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Headline {
    pub title: String,
    pub url: String,
    pub id: String,
}

/// Title and body text extracted from an article page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub title: String,
    pub content: String,
}

/// Structured enrichment decoded from a model reply.
///
/// Every field is optional because the model may omit any of them; the
/// enrichment step substitutes defaults when it persists the result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Enrichment {
    pub funny_translation: Option<String>,
    pub summary: Option<String>,
    pub topic: Option<String>,
    pub sentiment: Option<String>,
    pub key_entities: Option<Vec<String>>,
    pub core_points_markdown: Option<String>,
}

impl Enrichment {
    /// Synthetic result used when every backend is disabled or silent.
    pub fn unavailable(title: &str) -> Self {
        Self {
            funny_translation: None,
            summary: Some(format!(
                "Failed to generate summary for '{}'. Unable to connect to AI services.",
                title
            )),
            topic: Some("Unknown".to_string()),
            sentiment: Some("Neutral".to_string()),
            key_entities: Some(Vec::new()),
            core_points_markdown: Some(String::new()),
        }
    }

    /// Synthetic result used when analysis fails outside a backend attempt.
    pub fn failed(message: &str) -> Self {
        let short: String = message.chars().take(100).collect();
        Self {
            funny_translation: None,
            summary: Some(format!("Failed to generate summary. Error: {}...", short)),
            topic: Some("Error".to_string()),
            sentiment: Some("Unknown".to_string()),
            key_entities: Some(Vec::new()),
            core_points_markdown: Some(String::new()),
        }
    }
}

/// Redacted diagnostics view: counts, backend status, and a bare listing.
#[derive(Debug, Clone, Serialize)]
pub struct DebugSnapshot {
    pub article_count: usize,
    pub ai_status: AiStatus,
    pub articles: Vec<ArticleListing>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AiStatus {
    pub backends: Vec<BackendStatus>,
    pub last_used_model: String,
    pub available_models: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendStatus {
    pub name: String,
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ArticleListing {
    pub id: String,
    pub title: String,
    pub url: String,
    pub has_summary: bool,
}

impl From<&Article> for ArticleListing {
    fn from(a: &Article) -> Self {
        Self {
            id: a.id.clone(),
            title: a.title.clone(),
            url: a.url.clone(),
            has_summary: a.has_summary,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headline() -> Headline {
        Headline {
            title: "Storm hits coast".to_string(),
            url: "https://www.cnn.com/2025/05/06/weather/storm".to_string(),
            id: "abc123def0".to_string(),
        }
    }

    #[test]
    fn test_unanalyzed_article_defaults() {
        let article = Article::unanalyzed(&headline(), "Storm hits coast".to_string(), Utc::now());
        assert_eq!(article.domain, "www.cnn.com");
        assert!(!article.has_summary);
        assert_eq!(article.summary, PENDING_SUMMARY);
        assert_eq!(article.topic, "Unknown");
        assert_eq!(article.sentiment, "Unknown");
        assert!(article.key_entities.is_empty());
    }

    #[test]
    fn test_merge_only_touches_named_fields() {
        let mut article = Article::unanalyzed(&headline(), "Old".to_string(), Utc::now());
        article.merge(ArticleUpdate {
            topic: Some("weather".to_string()),
            ..Default::default()
        });
        assert_eq!(article.topic, "weather");
        assert_eq!(article.title, "Old");
        assert_eq!(article.summary, PENDING_SUMMARY);
    }

    #[test]
    fn test_merge_never_reverts_has_summary() {
        let mut article = Article::unanalyzed(&headline(), "t".to_string(), Utc::now());
        article.merge(ArticleUpdate {
            has_summary: Some(true),
            ..Default::default()
        });
        article.merge(ArticleUpdate {
            has_summary: Some(false),
            ..Default::default()
        });
        assert!(article.has_summary);
    }

    #[test]
    fn test_domain_of_invalid_url() {
        assert_eq!(domain_of("not a url"), "");
        assert_eq!(domain_of("https://edition.cnn.com/x"), "edition.cnn.com");
    }

    #[test]
    fn test_article_deserializes_with_missing_optional_fields() {
        let json = r#"{
            "id": "0123456789",
            "title": "T",
            "url": "https://www.cnn.com/a",
            "domain": "www.cnn.com",
            "crawled_at": "2025-05-06T12:00:00Z"
        }"#;
        let article: Article = serde_json::from_str(json).unwrap();
        assert!(!article.has_summary);
        assert!(article.funny_translation.is_empty());
        assert!(article.key_entities.is_empty());
    }

    #[test]
    fn test_failed_enrichment_truncates_message() {
        let message = "x".repeat(400);
        let e = Enrichment::failed(&message);
        assert_eq!(
            e.summary.unwrap(),
            format!("Failed to generate summary. Error: {}...", "x".repeat(100))
        );
        assert_eq!(e.topic.as_deref(), Some("Error"));
        assert_eq!(e.sentiment.as_deref(), Some("Unknown"));
    }
}
