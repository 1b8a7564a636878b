//! YAML configuration for the crawler, fetcher and analysis backends.
//!
//! Every field has a default, so a missing config file is equivalent to an
//! empty one. Selectors live here because source layouts drift.
//!
//! ```yaml
//! store_path: ./articles.json
//! source:
//!   listing_url: https://www.cnn.com
//!   sample_size: 9
//! analysis:
//!   models: [gpt-4o-mini]
//!   backends:
//!     - name: chat
//!       kind: chat
//!       api_base: http://localhost:1337/v1
//! ```

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, instrument};

/// Environment variable consulted for backend API keys missing from the file.
pub const API_KEY_ENV: &str = "HEADLINE_DIGEST_API_KEY";

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// JSON file backing the article store.
    pub store_path: String,
    pub source: SourceConfig,
    pub fetch: FetchConfig,
    pub analysis: AnalysisConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            store_path: "articles.json".to_string(),
            source: SourceConfig::default(),
            fetch: FetchConfig::default(),
            analysis: AnalysisConfig::default(),
        }
    }
}

/// Where headlines come from and how article pages are read.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Listing page; also the base origin for relative hrefs.
    pub listing_url: String,
    pub headline_selector: String,
    pub content_selector: String,
    pub sample_size: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            listing_url: "https://www.cnn.com".to_string(),
            headline_selector: r#"span.container__headline-text[data-editable="headline"]"#
                .to_string(),
            content_selector: ".paragraph".to_string(),
            sample_size: 9,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FetchConfig {
    pub user_agent: String,
    pub timeout_secs: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36"
                .to_string(),
            timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Known-good model identifiers; the first one is used.
    pub models: Vec<String>,
    /// Tried in order until one answers.
    pub backends: Vec<BackendConfig>,
    /// Retries per backend before it is disabled.
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            models: vec![
                "claude-3.7-sonnet".to_string(),
                "gemini-2.0-flash".to_string(),
                "gpt-4o-mini".to_string(),
            ],
            backends: vec![
                BackendConfig {
                    name: "chat-client".to_string(),
                    kind: BackendKind::Chat,
                    api_base: "http://localhost:1337/v1".to_string(),
                    api_key: None,
                },
                BackendConfig {
                    name: "direct-completion".to_string(),
                    kind: BackendKind::Completion,
                    api_base: "http://localhost:1337/v1".to_string(),
                    api_key: None,
                },
            ],
            max_retries: 0,
            retry_base_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// OpenAI-style `/chat/completions`, replies with a structured object.
    Chat,
    /// Plain `/completions` style call, reply may be raw text.
    Completion,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct BackendConfig {
    pub name: String,
    pub kind: BackendKind,
    pub api_base: String,
    #[serde(default)]
    pub api_key: Option<String>,
}

impl BackendConfig {
    /// Key from the file, else from [`API_KEY_ENV`].
    pub fn resolved_api_key(&self) -> Option<String> {
        self.api_key
            .clone()
            .or_else(|| std::env::var(API_KEY_ENV).ok())
            .filter(|k| !k.is_empty())
    }
}

impl AppConfig {
    /// Parse a YAML document.
    pub fn from_yaml(yaml: &str, origin: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(|source| ConfigError::Parse {
            path: origin.to_string(),
            source,
        })
    }

    /// Load `path`, or the defaults when `path` is `None` or does not exist.
    #[instrument(level = "info")]
    pub async fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            info!("No config file given; using defaults");
            return Ok(Self::default());
        };
        if !Path::new(path).exists() {
            info!(path, "Config file not found; using defaults");
            return Ok(Self::default());
        }
        let yaml = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_string(),
                source,
            })?;
        let config = Self::from_yaml(&yaml, path)?;
        info!(path, backends = config.analysis.backends.len(), "Loaded configuration");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_yaml_yields_defaults() {
        let config = AppConfig::from_yaml("{}", "inline").unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.store_path, "articles.json");
        assert_eq!(config.source.sample_size, 9);
        assert_eq!(config.analysis.backends.len(), 2);
        assert_eq!(config.analysis.backends[0].kind, BackendKind::Chat);
    }

    #[test]
    fn test_partial_yaml_overrides() {
        let yaml = r#"
store_path: /tmp/articles.json
source:
  listing_url: https://lite.cnn.com
analysis:
  models: [gpt-4o-mini]
  backends:
    - name: local
      kind: completion
      api_base: http://127.0.0.1:8080/v1
      api_key: secret
"#;
        let config = AppConfig::from_yaml(yaml, "inline").unwrap();
        assert_eq!(config.store_path, "/tmp/articles.json");
        assert_eq!(config.source.listing_url, "https://lite.cnn.com");
        assert_eq!(config.source.content_selector, ".paragraph");
        assert_eq!(config.analysis.models, vec!["gpt-4o-mini".to_string()]);
        assert_eq!(config.analysis.backends[0].kind, BackendKind::Completion);
        assert_eq!(
            config.analysis.backends[0].resolved_api_key().as_deref(),
            Some("secret")
        );
        assert_eq!(config.fetch.timeout_secs, 30);
    }

    #[test]
    fn test_invalid_yaml_is_an_error() {
        let err = AppConfig::from_yaml("source: [unterminated", "bad.yaml").unwrap_err();
        assert!(err.to_string().contains("bad.yaml"));
    }

    #[tokio::test]
    async fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.yaml");
        let config = AppConfig::load(path.to_str()).await.unwrap();
        assert_eq!(config, AppConfig::default());
    }
}
