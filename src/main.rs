//! # Headline Digest
//!
//! Crawls headline links from a news listing page, extracts full article
//! text, and lazily enriches each article through a generative-text backend
//! with a summary, sentiment, topic, key entities, a lighter paraphrase and
//! markdown bullet points. Articles persist in a JSON file.
//!
//! ## Usage
//!
//! ```sh
//! headline_digest crawl
//! headline_digest list
//! headline_digest view <id>
//! ```
//!
//! ## Architecture
//!
//! 1. **Crawl**: Discover new headlines, extract each article, store it unanalyzed
//! 2. **View**: On first view, re-extract the article and ask the backends for
//!    an enrichment, decode the reply, sanitize it and persist it once
//! 3. **Diagnostics**: Report store size and backend availability

use clap::Parser;
use std::error::Error;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod analysis;
mod api;
mod cli;
mod config;
mod error;
mod fetcher;
mod models;
mod parser;
mod pipeline;
mod scrapers;
mod store;
mod utils;

use analysis::{Analyzer, BackendRegistry};
use cli::{Cli, Command};
use config::AppConfig;
use fetcher::Fetcher;
use pipeline::NewsPipeline;
use store::ArticleStore;

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    let args = Cli::parse();
    debug!(?args, "Parsed CLI arguments");

    let config = AppConfig::load(args.config.as_deref()).await?;
    let store_path = args.store.clone().unwrap_or_else(|| config.store_path.clone());

    let pipeline = NewsPipeline::new(
        Fetcher::new(&config.fetch)?,
        config.source.clone(),
        ArticleStore::load(&store_path).await,
        Analyzer::new(BackendRegistry::from_config(&config.analysis)?),
    );

    match args.command {
        Command::Crawl => {
            let added = pipeline.crawl().await;
            info!(added, "Crawl finished");
            print_json(&serde_json::json!({ "added": added }))?;
        }
        Command::View { id } => match pipeline.view_article(&id).await? {
            Some(article) => print_json(&article)?,
            None => {
                info!(%id, "Article not found");
                print_json(&serde_json::Value::Null)?;
            }
        },
        Command::List => print_json(&pipeline.list_articles().await)?,
        Command::Clear => {
            pipeline.clear().await?;
            print_json(&serde_json::json!({ "cleared": true }))?;
        }
        Command::Debug => print_json(&pipeline.debug_snapshot().await)?,
    }

    let elapsed = start_time.elapsed();
    info!(?elapsed, "Execution complete");
    Ok(())
}
