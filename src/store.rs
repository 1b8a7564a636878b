//! Persisted article collection backed by a single JSON file.
//!
//! The whole collection is held in memory and rewritten in full on every
//! mutation. Mutations are serialized behind one async mutex and written
//! through a temp file and rename, so concurrent updates cannot overwrite
//! each other and a crash mid-write leaves the previous file intact. The
//! in-memory copy changes only after the write succeeds.
//!
//! A backing file that cannot be read or parsed is moved aside to
//! `<file>.corrupt-<unix-ts>` and the store starts empty. When it cannot be
//! moved, the store refuses writes instead of overwriting it.

use crate::error::StoreError;
use crate::models::{Article, ArticleUpdate};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

/// Result of [`ArticleStore::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    NotFound,
    /// An enrichment arrived for an article that was already enriched.
    AlreadyEnriched,
}

#[derive(Debug)]
pub struct ArticleStore {
    path: PathBuf,
    articles: Mutex<Vec<Article>>,
    /// Cleared when an unusable backing file could not be moved aside.
    writable: bool,
}

impl ArticleStore {
    /// Read the backing file. A missing file yields an empty store; an
    /// unreadable or unparseable one is moved aside first.
    ///
    /// If a bad file cannot be moved aside the store starts empty and refuses
    /// every write, so the file is never overwritten.
    #[instrument(level = "info", skip_all, fields(path = %path.as_ref().display()))]
    pub async fn load(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let (articles, writable) = match read_collection(&path).await {
            Some(articles) => (articles, true),
            None => (Vec::new(), false),
        };
        info!(count = articles.len(), writable, "Article store loaded");
        Self {
            path,
            articles: Mutex::new(articles),
            writable,
        }
    }

    /// Append `article`. Returns `false` without writing if its id is taken.
    pub async fn add(&self, article: Article) -> Result<bool, StoreError> {
        let mut guard = self.articles.lock().await;
        if guard.iter().any(|a| a.id == article.id) {
            warn!(id = %article.id, url = %article.url, "Article id already stored; not adding");
            return Ok(false);
        }
        let mut next = guard.clone();
        debug!(id = %article.id, url = %article.url, "Adding article");
        next.push(article);
        self.persist(&next).await?;
        *guard = next;
        Ok(true)
    }

    /// Merge `update` into the article with `id`.
    ///
    /// An enrichment update (one setting `has_summary`) against an article
    /// that is already enriched changes nothing.
    #[instrument(level = "info", skip(self, update))]
    pub async fn update(&self, id: &str, update: ArticleUpdate) -> Result<UpdateOutcome, StoreError> {
        let mut guard = self.articles.lock().await;
        let Some(index) = guard.iter().position(|a| a.id == id) else {
            warn!("Update for unknown article");
            return Ok(UpdateOutcome::NotFound);
        };
        if update.is_enrichment() && guard[index].has_summary {
            debug!("Article already enriched; update skipped");
            return Ok(UpdateOutcome::AlreadyEnriched);
        }

        let mut next = guard.clone();
        next[index].merge(update);
        self.persist(&next).await?;
        *guard = next;
        Ok(UpdateOutcome::Updated)
    }

    /// All articles, most recently crawled first.
    pub async fn get_all(&self) -> Vec<Article> {
        let mut articles = self.articles.lock().await.clone();
        articles.sort_by(|a, b| b.crawled_at.cmp(&a.crawled_at));
        articles
    }

    pub async fn get_by_id(&self, id: &str) -> Option<Article> {
        self.articles
            .lock()
            .await
            .iter()
            .find(|a| a.id == id)
            .cloned()
    }

    /// URLs of every stored article.
    pub async fn urls(&self) -> std::collections::HashSet<String> {
        self.articles
            .lock()
            .await
            .iter()
            .map(|a| a.url.clone())
            .collect()
    }

    #[instrument(level = "info", skip(self))]
    pub async fn clear(&self) -> Result<(), StoreError> {
        let mut guard = self.articles.lock().await;
        self.persist(&[]).await?;
        let removed = guard.len();
        guard.clear();
        info!(removed, "Article store cleared");
        Ok(())
    }

    async fn persist(&self, articles: &[Article]) -> Result<(), StoreError> {
        if !self.writable {
            return Err(StoreError::ReadOnly {
                path: self.path.display().to_string(),
            });
        }
        let json = serde_json::to_string_pretty(articles)?;
        let tmp = self.path.with_extension("json.tmp");
        let io = |source| StoreError::Io {
            path: self.path.display().to_string(),
            source,
        };
        fs::write(&tmp, json).await.map_err(io)?;
        fs::rename(&tmp, &self.path).await.map_err(io)?;
        debug!(count = articles.len(), "Article store written");
        Ok(())
    }
}

/// `None` when the file exists but is unusable and could not be moved aside.
async fn read_collection(path: &Path) -> Option<Vec<Article>> {
    let problem = match fs::read(path).await {
        Ok(raw) => match serde_json::from_slice::<Vec<Article>>(&raw) {
            Ok(articles) => return Some(articles),
            Err(e) => e.to_string(),
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No article store yet; starting empty");
            return Some(Vec::new());
        }
        Err(e) => e.to_string(),
    };

    let backup = corrupt_backup_path(path, Utc::now().timestamp()).await;
    match fs::rename(path, &backup).await {
        Ok(()) => {
            warn!(
                error = %problem,
                backup = %backup.display(),
                "Article store unusable; moved aside and starting empty"
            );
            Some(Vec::new())
        }
        Err(mv) => {
            error!(
                error = %problem,
                move_error = %mv,
                "Article store unusable and could not be moved aside; writes disabled"
            );
            None
        }
    }
}

/// First free `<file>.corrupt-<ts>` name, with `-<n>` appended when taken.
async fn corrupt_backup_path(path: &Path, ts: i64) -> PathBuf {
    let file_name = path.file_name().unwrap_or_default().to_string_lossy();
    let mut candidate = path.with_file_name(format!("{file_name}.corrupt-{ts}"));
    let mut n = 1;
    while fs::try_exists(&candidate).await.unwrap_or(false) {
        candidate = path.with_file_name(format!("{file_name}.corrupt-{ts}-{n}"));
        n += 1;
    }
    candidate
}
