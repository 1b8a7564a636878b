//! Command-line interface definitions for Headline Digest.
//!
//! This module defines the CLI arguments and subcommands using the `clap`
//! crate. Global options can also be provided via environment variables.

use clap::{Parser, Subcommand};

/// Command-line arguments for the Headline Digest application.
///
/// # Examples
///
/// ```sh
/// # Discover new headlines and store them unanalyzed
/// headline_digest crawl
///
/// # Show an article, generating its summary on first view
/// headline_digest view 3f2a9c01de
///
/// # Use a specific config and store file
/// headline_digest --config ./config.yaml --store ./articles.json list
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// Path to config.yaml
    #[arg(short, long, env = "HEADLINE_DIGEST_CONFIG")]
    pub config: Option<String>,

    /// Article store file (overrides `store_path` from the config)
    #[arg(short, long, env = "HEADLINE_DIGEST_STORE")]
    pub store: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Discover new headlines and store them unanalyzed
    Crawl,
    /// Show an article, enriching it on first view
    View {
        /// Article identifier
        id: String,
    },
    /// List stored articles, most recently crawled first
    List,
    /// Remove every stored article
    Clear,
    /// Print article count, AI backend status and a redacted listing
    Debug,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::parse_from([
            "headline_digest",
            "--config",
            "./config.yaml",
            "--store",
            "./articles.json",
            "list",
        ]);

        assert_eq!(cli.config.as_deref(), Some("./config.yaml"));
        assert_eq!(cli.store.as_deref(), Some("./articles.json"));
        assert_eq!(cli.command, Command::List);
    }

    #[test]
    fn test_cli_short_flags_and_view() {
        let cli = Cli::parse_from(["headline_digest", "-c", "/tmp/c.yaml", "view", "3f2a9c01de"]);

        assert_eq!(cli.config.as_deref(), Some("/tmp/c.yaml"));
        assert_eq!(
            cli.command,
            Command::View {
                id: "3f2a9c01de".to_string()
            }
        );
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["headline_digest"]).is_err());
    }

    #[test]
    fn test_cli_view_requires_id() {
        assert!(Cli::try_parse_from(["headline_digest", "view"]).is_err());
    }
}
