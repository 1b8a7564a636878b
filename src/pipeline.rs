//! Crawl and lazy-enrichment workflow over the article store.
//!
//! Crawling discovers new headlines, extracts each article and stores it
//! unanalyzed. Viewing an unanalyzed article re-extracts it, runs analysis,
//! sanitizes the result and persists it in one update; viewing an analyzed
//! article is a plain read.

use crate::analysis::Analyzer;
use crate::config::SourceConfig;
use crate::error::StoreError;
use crate::fetcher::Fetcher;
use crate::models::{
    Article, ArticleListing, ArticleUpdate, DebugSnapshot, Enrichment, LONG_FIELD_MAX,
    MAX_ENTITIES, SENTIMENT_MAX, TOPIC_MAX,
};
use crate::scrapers::content::extract_content;
use crate::scrapers::headlines::index_headlines;
use crate::store::{ArticleStore, UpdateOutcome};
use crate::utils::sanitize_text;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use itertools::Itertools;
use tracing::{debug, error, info, instrument, warn};

/// Turn an analysis result into the update that marks an article enriched.
///
/// Missing fields get placeholders, every text field is stripped of
/// non-printable characters and bounded, and entities are de-duplicated and
/// capped. Idempotent.
pub fn sanitize_enrichment(enrichment: Enrichment) -> ArticleUpdate {
    let text = |value: Option<String>, default: &str, max: usize| {
        sanitize_text(value.as_deref().unwrap_or(default), max)
    };

    let key_entities = enrichment
        .key_entities
        .unwrap_or_default()
        .iter()
        .map(|e| sanitize_text(e, LONG_FIELD_MAX).trim().to_string())
        .filter(|e| !e.is_empty())
        .unique()
        .take(MAX_ENTITIES)
        .collect();

    ArticleUpdate {
        title: None,
        has_summary: Some(true),
        summary: Some(text(enrichment.summary, "No summary available", LONG_FIELD_MAX)),
        funny_translation: Some(text(
            enrichment.funny_translation,
            "No funny translation available",
            LONG_FIELD_MAX,
        )),
        topic: Some(text(enrichment.topic, "Unknown", TOPIC_MAX)),
        sentiment: Some(text(enrichment.sentiment, "Unknown", SENTIMENT_MAX)),
        key_entities: Some(key_entities),
        core_points_markdown: Some(text(enrichment.core_points_markdown, "", LONG_FIELD_MAX)),
    }
}

pub struct NewsPipeline {
    fetcher: Fetcher,
    source: SourceConfig,
    store: ArticleStore,
    analyzer: Analyzer,
}

impl NewsPipeline {
    pub fn new(fetcher: Fetcher, source: SourceConfig, store: ArticleStore, analyzer: Analyzer) -> Self {
        Self {
            fetcher,
            source,
            store,
            analyzer,
        }
    }

    /// Discover new headlines and store each article unanalyzed.
    ///
    /// Returns how many articles were added. Per-article failures are logged
    /// and skipped.
    #[instrument(level = "info", skip_all)]
    pub async fn crawl(&self) -> usize {
        let existing = self.store.urls().await;
        let headlines = index_headlines(&self.fetcher, &self.source, &existing).await;
        let total = headlines.len();

        let added = stream::iter(headlines)
            .then(|headline| async move {
                let extracted = extract_content(&self.fetcher, &self.source, &headline.url).await;
                let article = Article::unanalyzed(&headline, extracted.title, Utc::now());
                match self.store.add(article).await {
                    Ok(added) => added,
                    Err(e) => {
                        error!(url = %headline.url, error = %e, "Failed to store crawled article");
                        false
                    }
                }
            })
            .filter(|added| std::future::ready(*added))
            .count()
            .await;

        info!(discovered = total, added, "Crawl complete");
        added
    }

    /// Current state of an article, enriching it first if it has not been.
    ///
    /// `Ok(None)` when no article has `id`.
    #[instrument(level = "info", skip(self))]
    pub async fn view_article(&self, id: &str) -> Result<Option<Article>, StoreError> {
        let Some(article) = self.store.get_by_id(id).await else {
            debug!("No such article");
            return Ok(None);
        };
        if article.has_summary {
            return Ok(Some(article));
        }

        let extracted = extract_content(&self.fetcher, &self.source, &article.url).await;
        if extracted.content.is_empty() {
            warn!(url = %article.url, "No article text extracted; leaving unanalyzed");
            return Ok(Some(article));
        }

        let enrichment = self.analyzer.analyze(&extracted.title, &extracted.content).await;
        match self.store.update(id, sanitize_enrichment(enrichment)).await? {
            UpdateOutcome::Updated => info!("Article enriched"),
            outcome => warn!(?outcome, "Enrichment not applied"),
        }
        Ok(self.store.get_by_id(id).await)
    }

    pub async fn list_articles(&self) -> Vec<Article> {
        self.store.get_all().await
    }

    pub async fn clear(&self) -> Result<(), StoreError> {
        self.store.clear().await
    }

    /// Article count, backend status and a listing without enrichment text.
    pub async fn debug_snapshot(&self) -> DebugSnapshot {
        let articles = self.store.get_all().await;
        DebugSnapshot {
            article_count: articles.len(),
            ai_status: self.analyzer.registry().status(),
            articles: articles.iter().map(ArticleListing::from).collect(),
        }
    }
}
