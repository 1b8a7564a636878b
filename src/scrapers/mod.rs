//! News source scrapers for discovering and reading articles.
//!
//! Scraping follows the same two-phase pattern for every source:
//!
//! 1. **Indexing**: Discover headline links on the source's listing page
//! 2. **Fetching**: Download an article page and pull out its title and text
//!
//! | Phase | Module | Entry point | On failure |
//! |-------|--------|-------------|------------|
//! | Indexing | [`headlines`] | `index_headlines()` | empty list |
//! | Fetching | [`content`] | `extract_content()` | sentinel content |
//!
//! Selectors come from [`crate::config::SourceConfig`], so a layout change
//! on the source site is a config edit.

pub mod content;
pub mod headlines;
