//! Error types for the crawl and enrichment pipeline.
//!
//! None of these are fatal to the process. The components that own a
//! recovery path (content extraction, analysis, response parsing) convert
//! them into placeholder values before they reach a caller; the store
//! surfaces [`StoreError`] only when a rewrite of the backing file fails.

use thiserror::Error;

/// A page fetch failed at the transport level or returned a non-2xx status.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("could not build HTTP client: {0}")]
    Client(#[source] reqwest::Error),
}

/// A single analysis backend failed to produce a completion.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("backend returned HTTP {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("malformed completion body: {0}")]
    Malformed(String),
}

/// Setup failures around the per-backend attempts.
#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("no model identifiers configured")]
    NoModels,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{path} could not be moved aside after a failed load; refusing to overwrite it")]
    ReadOnly { path: String },
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
}
