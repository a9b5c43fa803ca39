//! The boundary to the external citation source.
//!
//! The scheduler and the records only see this trait; the concrete
//! HTML-scraping fetcher lives in its own crate so matching, backoff, and
//! persistence can be tested against a mock without a live HTTP dependency.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use thiserror::Error;

/// Outcome of one completed query against the external source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// A candidate cleared the match threshold; its reported citation count.
    Cited(u32),
    /// The query completed but no candidate cleared the threshold. A
    /// legitimate outcome for brand-new or obscure publications.
    NotFound,
    /// The source served its anti-scraping response instead of results.
    Blocked,
}

/// Transport or parse failure during a fetch attempt.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected HTTP status {0}")]
    Status(u16),
    #[error("parse error: {0}")]
    Parse(String),
}

pub type FetchFuture<'a> = Pin<Box<dyn Future<Output = Result<FetchOutcome, FetchError>> + Send + 'a>>;

/// A source that can resolve "how often has this title been cited?".
pub trait CitationSource: Send + Sync {
    /// Canonical name of the source, for log lines.
    fn name(&self) -> &str;

    /// Query the source for the given title. The title may carry the
    /// store's percent-escaping; implementations normalize as needed.
    fn fetch<'a>(
        &'a self,
        title: &'a str,
        client: &'a reqwest::Client,
        timeout: Duration,
    ) -> FetchFuture<'a>;
}
