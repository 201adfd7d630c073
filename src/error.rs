//! Crate-wide error taxonomy.
//!
//! Resource and CSS failures never surface here: they degrade silently to
//! blank references inside the archiver. The types below cover the conditions
//! that do cross module boundaries.

use thiserror::Error;

/// Errors from the archiver pipeline itself (not from individual resource
/// fetches, which degrade to blanks).
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("invalid base URL {url}: {source}")]
    InvalidBaseUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
}

/// Errors from a crawl run. Per-item failures are logged and skipped inside
/// the loop; these are the conditions that reject a whole run.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("invalid start URL {url}: {source}")]
    InvalidStartUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("capture agent failure: {0}")]
    Agent(String),
}

/// Replay resolution errors. `NotFound` is a user-facing condition (a 404 at
/// the HTTP layer) and must never be conflated with `Internal`.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error("no matching project, version, or page")]
    NotFound,
    #[error("replay infrastructure failure: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Rejection reasons for obfuscation rules, reported synchronously at
/// create/update time. A rejected rule is never partially stored.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RuleError {
    #[error("replacement text may not contain a script tag")]
    ScriptInReplacement,
    #[error("replacement text may not contain an inline event handler")]
    EventHandlerInReplacement,
    #[error("search pattern does not compile as a regex: {0}")]
    InvalidPattern(String),
}
