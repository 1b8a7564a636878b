//! Article page content extraction.
//!
//! The title is the first `<h1>`. The body is every element matching the
//! configured content selector joined with spaces; when that yields nothing
//! the extractor falls back to every `<p>` on the page.

use crate::config::SourceConfig;
use crate::fetcher::Fetcher;
use crate::models::ExtractedContent;
use crate::utils::truncate_chars;
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use tracing::{info, instrument, warn};

/// Maximum number of characters of body text kept per article.
pub const MAX_CONTENT_CHARS: usize = 8000;

pub const NO_TITLE: &str = "No title found";

static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h1").expect("static selector"));
static PARAGRAPH_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p").expect("static selector"));

fn joined_text(document: &Html, selector: &Selector) -> String {
    document
        .select(selector)
        .map(|el| el.text().collect::<String>())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract title and body text from an article page.
pub fn parse_article(html: &str, content_selector: &str) -> ExtractedContent {
    let document = Html::parse_document(html);

    let title = document
        .select(&TITLE_SELECTOR)
        .next()
        .map(|h1| h1.text().collect::<String>().trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| NO_TITLE.to_string());

    let mut content = match Selector::parse(content_selector) {
        Ok(selector) => joined_text(&document, &selector),
        Err(e) => {
            warn!(selector = content_selector, error = %e, "Invalid content selector");
            String::new()
        }
    };
    if content.is_empty() {
        content = joined_text(&document, &PARAGRAPH_SELECTOR);
    }

    ExtractedContent {
        title,
        content: truncate_chars(&content, MAX_CONTENT_CHARS),
    }
}

/// Fetch and extract an article. Never fails.
///
/// On a fetch failure the sentinel `{title: "Error", content: "Failed to
/// extract content: <cause>"}` is returned and flows on like real content.
#[instrument(level = "info", skip(fetcher, source))]
pub async fn extract_content(fetcher: &Fetcher, source: &SourceConfig, url: &str) -> ExtractedContent {
    match fetcher.fetch(url).await {
        Ok(html) => {
            let extracted = parse_article(&html, &source.content_selector);
            info!(chars = extracted.content.chars().count(), "Parsed article");
            extracted
        }
        Err(e) => {
            warn!(error = %e, "Content extraction failed; using sentinel");
            ExtractedContent {
                title: "Error".to_string(),
                content: format!("Failed to extract content: {}", e),
            }
        }
    }
}
