use std::path::{Path, PathBuf};
use std::time::Duration;

pub mod distance;
pub mod fetcher;
pub mod mock;
pub mod record;
pub mod service;
pub mod store;

// Re-export for convenience
pub use distance::levenshtein;
pub use fetcher::{CitationSource, FetchError, FetchOutcome};
pub use record::{CitationRecord, Citations, RefreshStatus};
pub use service::CitationService;
pub use store::{CITATIONS_FILE, PROBLEMS_FILE, StoreError};

/// Configuration for the citation service.
///
/// Constructed once at startup and handed to [`CitationService`]; there is
/// no ambient global state. Defaults: an 18 minute refresh interval, a 30
/// hour backoff once robot detection fires (at least two orders of
/// magnitude above the refresh interval), and up to 2 seconds of jitter on
/// every sleep.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Path of the citation store file.
    pub citations_path: PathBuf,
    /// Path of the append-only problems log.
    pub problems_path: PathBuf,
    /// Base delay between refresh rounds.
    pub refresh_delay: Duration,
    /// Base delay after a blocked round. Must dwarf `refresh_delay`;
    /// repeated requests at the normal cadence accelerate detection.
    pub blocked_delay: Duration,
    /// Upper bound of the random jitter added to every sleep.
    pub jitter: Duration,
    /// HTTP timeout for a single fetch.
    pub fetch_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            citations_path: PathBuf::from(CITATIONS_FILE),
            problems_path: PathBuf::from(PROBLEMS_FILE),
            refresh_delay: Duration::from_secs(18 * 60),
            blocked_delay: Duration::from_secs(1800 * 60),
            jitter: Duration::from_secs(2),
            fetch_timeout: Duration::from_secs(30),
        }
    }
}

impl ServiceConfig {
    /// Config with both files under `dir` and default cadence.
    pub fn for_dir(dir: &Path) -> Self {
        Self {
            citations_path: dir.join(CITATIONS_FILE),
            problems_path: dir.join(PROBLEMS_FILE),
            ..Self::default()
        }
    }
}
