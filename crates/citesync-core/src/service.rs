//! The long-running refresh loop.
//!
//! One record at a time, deliberately: concurrent requests to the external
//! source would accelerate robot detection. The loop reads the store, picks
//! the stalest record, refreshes it, persists a full snapshot, and sleeps.
//! A blocked round skips persistence (the record is untouched) and backs
//! off for the long interval before retrying the same record.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use tokio_util::sync::CancellationToken;

use crate::ServiceConfig;
use crate::fetcher::CitationSource;
use crate::record::{CitationRecord, Citations, RefreshStatus};
use crate::store;

/// The scheduler driving periodic citation refreshes.
pub struct CitationService {
    config: ServiceConfig,
    source: Arc<dyn CitationSource>,
    client: reqwest::Client,
}

impl CitationService {
    pub fn new(config: ServiceConfig, source: Arc<dyn CitationSource>) -> Self {
        Self {
            config,
            source,
            client: reqwest::Client::new(),
        }
    }

    /// Run rounds until `cancel` fires.
    ///
    /// The store is persisted before every sleep, so cancellation during
    /// the sleep (or between rounds) never loses a completed refresh. An
    /// in-flight fetch is allowed to complete.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            source = self.source.name(),
            store = %self.config.citations_path.display(),
            "citation service started"
        );
        loop {
            if cancel.is_cancelled() {
                break;
            }
            let delay = self.run_round().await;
            let delay = with_jitter(delay, self.config.jitter);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        tracing::info!("citation service stopped");
    }

    /// One refresh round: select, fetch, persist, report.
    ///
    /// Returns the base delay to sleep before the next round (jitter is
    /// added by the caller). Never fails; store and fetch problems are
    /// logged and the loop carries on.
    pub async fn run_round(&self) -> Duration {
        let mut records = match store::load_records(&self.config.citations_path) {
            Ok(records) => records,
            Err(e) => {
                tracing::error!(
                    path = %self.config.citations_path.display(),
                    error = %e,
                    "failed to read citation store"
                );
                return self.config.refresh_delay;
            }
        };

        let Some(index) = next_index(&records) else {
            tracing::info!("citation store is empty, nothing to refresh");
            return self.config.refresh_delay;
        };

        let now = now_millis();
        let record = &mut records[index];
        let old = record.citations;
        tracing::info!(key = %record.key, title = %record.title, old = %old, "refreshing citations");
        let status = record
            .refresh(
                self.source.as_ref(),
                &self.client,
                self.config.fetch_timeout,
                now,
            )
            .await;

        match status {
            RefreshStatus::Blocked => {
                tracing::warn!(
                    key = %records[index].key,
                    backoff_mins = self.config.blocked_delay.as_secs() / 60,
                    "blocked by robot detection, backing off"
                );
                return self.config.blocked_delay;
            }
            RefreshStatus::Regressed { previous } => {
                if let Err(e) = store::append_record(&self.config.problems_path, &previous) {
                    tracing::error!(
                        path = %self.config.problems_path.display(),
                        error = %e,
                        "failed to append to problems log"
                    );
                }
            }
            RefreshStatus::Updated { .. } => {}
        }

        let record = &records[index];
        tracing::info!(
            key = %record.key,
            old = %old,
            new = %record.citations,
            last_update = record.last_update,
            "refresh complete"
        );

        if let Err(e) = store::write_records(&self.config.citations_path, &records) {
            tracing::error!(
                path = %self.config.citations_path.display(),
                error = %e,
                "failed to write citation store"
            );
        }

        self.config.refresh_delay
    }
}

/// Selection policy: the first never-fetched record in store order wins;
/// otherwise the least recently updated one.
pub fn next_index(records: &[CitationRecord]) -> Option<usize> {
    if records.is_empty() {
        return None;
    }
    let mut next = 0;
    for (i, record) in records.iter().enumerate() {
        if record.citations == Citations::Uninitialized {
            return Some(i);
        }
        if record.last_update < records[next].last_update {
            next = i;
        }
    }
    Some(next)
}

/// Add bounded random jitter so multiple instances never fall into a
/// synchronized retry rhythm.
fn with_jitter(base: Duration, jitter: Duration) -> Duration {
    let bound = jitter.as_millis() as u64;
    if bound == 0 {
        return base;
    }
    base + Duration::from_millis(fastrand::u64(..bound))
}

pub(crate) fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(key: &str, citations: Citations, last_update: i64) -> CitationRecord {
        CitationRecord {
            key: key.into(),
            title: format!("title of {key}"),
            citations,
            last_update,
        }
    }

    #[test]
    fn test_selects_least_recently_updated() {
        let records = vec![
            record("a", Citations::Cited(1), 100),
            record("b", Citations::Cited(2), 50),
            record("c", Citations::Cited(3), 200),
        ];
        assert_eq!(next_index(&records), Some(1));
    }

    #[test]
    fn test_uninitialized_preempts_staleness() {
        let records = vec![
            record("a", Citations::Uninitialized, 50),
            record("b", Citations::Cited(5), 10),
        ];
        assert_eq!(next_index(&records), Some(0));
    }

    #[test]
    fn test_first_uninitialized_in_store_order() {
        let records = vec![
            record("a", Citations::Cited(5), 10),
            record("b", Citations::Uninitialized, 99),
            record("c", Citations::Uninitialized, 1),
        ];
        assert_eq!(next_index(&records), Some(1));
    }

    #[test]
    fn test_empty_store_selects_nothing() {
        assert_eq!(next_index(&[]), None);
    }

    #[test]
    fn test_tie_keeps_store_order() {
        let records = vec![
            record("a", Citations::Cited(1), 7),
            record("b", Citations::Cited(2), 7),
        ];
        assert_eq!(next_index(&records), Some(0));
    }

    #[test]
    fn test_jitter_is_bounded() {
        let base = Duration::from_secs(60);
        let jitter = Duration::from_secs(2);
        for _ in 0..100 {
            let d = with_jitter(base, jitter);
            assert!(d >= base);
            assert!(d < base + jitter);
        }
    }

    #[test]
    fn test_zero_jitter_is_identity() {
        let base = Duration::from_secs(60);
        assert_eq!(with_jitter(base, Duration::ZERO), base);
    }

    #[test]
    fn test_blocked_delay_dwarfs_refresh_delay() {
        let config = ServiceConfig::default();
        assert!(config.blocked_delay >= config.refresh_delay * 100);
    }
}
