//! Headline discovery on a news listing page.
//!
//! Each element matching the configured headline selector contributes its
//! text as the title and the href of the element itself (when it is an
//! anchor) or of its closest enclosing anchor. Relative hrefs are resolved
//! against the listing URL.
//!
//! Candidates whose URL is already stored are dropped *before* a bounded
//! random sample is drawn, so a crawl never re-adds a known article.

use crate::config::SourceConfig;
use crate::fetcher::Fetcher;
use crate::models::Headline;
use itertools::Itertools;
use rand::Rng;
use rand::seq::IndexedRandom;
use scraper::{ElementRef, Html, Selector};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use tracing::{debug, info, instrument, warn};
use url::Url;

/// Number of hex digits kept from the URL digest.
///
/// 40 bits: for `n` stored articles the chance of any collision is roughly
/// `n² / 2⁴¹`, about 4.5e-7 at 1,000 articles. Discovery also rejects a
/// candidate whose id is already taken, so ids stay unique within a store.
pub const ID_LEN: usize = 10;

/// Stable identifier for an article URL: the first [`ID_LEN`] hex digits of
/// its SHA-256 digest.
pub fn article_id(url: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
    digest[..ID_LEN].to_string()
}

/// Every acceptable headline on the page, in document order.
///
/// A candidate is accepted when its title, URL and id are non-empty, its URL
/// is not in `existing_urls`, and neither its URL nor its id was already
/// seen. Returns an empty list when the selector or base URL is invalid.
pub fn headline_candidates(
    listing_html: &str,
    source: &SourceConfig,
    existing_urls: &HashSet<String>,
) -> Vec<Headline> {
    let base = match Url::parse(&source.listing_url) {
        Ok(base) => base,
        Err(e) => {
            warn!(listing_url = %source.listing_url, error = %e, "Invalid listing URL");
            return Vec::new();
        }
    };
    let selector = match Selector::parse(&source.headline_selector) {
        Ok(selector) => selector,
        Err(e) => {
            warn!(selector = %source.headline_selector, error = %e, "Invalid headline selector");
            return Vec::new();
        }
    };

    let document = Html::parse_document(listing_html);
    let mut seen_urls = existing_urls.clone();
    let mut seen_ids: HashSet<String> = existing_urls.iter().map(|u| article_id(u)).collect();
    let mut candidates = Vec::new();

    for element in document.select(&selector) {
        let title = element.text().flat_map(str::split_whitespace).join(" ");
        let Some(href) = enclosing_href(element) else {
            continue;
        };
        let Ok(resolved) = base.join(href) else {
            debug!(href, "Unresolvable headline href");
            continue;
        };
        let url = resolved.to_string();
        let id = article_id(&url);

        if title.is_empty() || url.is_empty() || id.is_empty() {
            continue;
        }
        if seen_urls.contains(&url) || seen_ids.contains(&id) {
            continue;
        }
        seen_urls.insert(url.clone());
        seen_ids.insert(id.clone());
        candidates.push(Headline { title, url, id });
    }

    candidates
}

/// The href of `element` if it is an anchor, else of its nearest anchor ancestor.
fn enclosing_href(element: ElementRef<'_>) -> Option<&str> {
    std::iter::once(element)
        .chain(element.ancestors().filter_map(ElementRef::wrap))
        .find(|e| e.value().name() == "a")
        .and_then(|a| a.value().attr("href"))
        .map(str::trim)
        .filter(|href| !href.is_empty())
}

/// Uniform sample of at most `n` headlines without replacement.
pub fn sample_headlines<R: Rng + ?Sized>(
    candidates: &[Headline],
    n: usize,
    rng: &mut R,
) -> Vec<Headline> {
    candidates.choose_multiple(rng, n).cloned().collect()
}

/// Discover new headlines on a listing page and sample up to
/// `source.sample_size` of them.
pub fn discover_headlines(
    listing_html: &str,
    source: &SourceConfig,
    existing_urls: &HashSet<String>,
) -> Vec<Headline> {
    let candidates = headline_candidates(listing_html, source, existing_urls);
    let selected = sample_headlines(&candidates, source.sample_size, &mut rand::rng());
    info!(
        candidates = candidates.len(),
        selected = selected.len(),
        "Discovered headlines"
    );
    selected
}

/// Fetch the listing page and discover new headlines on it.
///
/// A failed fetch yields an empty list.
#[instrument(level = "info", skip_all, fields(listing_url = %source.listing_url))]
pub async fn index_headlines(
    fetcher: &Fetcher,
    source: &SourceConfig,
    existing_urls: &HashSet<String>,
) -> Vec<Headline> {
    match fetcher.fetch(&source.listing_url).await {
        Ok(html) => discover_headlines(&html, source, existing_urls),
        Err(e) => {
            warn!(error = %e, "Listing fetch failed; no headlines discovered");
            Vec::new()
        }
    }
}
