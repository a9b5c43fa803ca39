//! Citation records and the sentinel encoding of the citation store.

use std::fmt;
use std::time::Duration;

use crate::fetcher::{CitationSource, FetchError, FetchOutcome};

/// Legacy integer encoding of the non-count states, as persisted in
/// existing citation files.
const RAW_UNINITIALIZED: i64 = -1;
const RAW_NOT_FOUND: i64 = -2;
const RAW_FETCH_PROBLEM: i64 = -3;
const RAW_BLOCKED: i64 = -4;

/// Citation count of a record, including the error states that are carried
/// in the count field so they can be persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Citations {
    /// A real, non-negative count from the external source.
    Cited(u32),
    /// Never fetched; refreshed with highest priority.
    Uninitialized,
    /// Fetch completed but no candidate cleared the match threshold.
    NotFound,
    /// Transport or parse failure; retried on the next natural rotation.
    FetchProblem,
    /// Robot detection fired. Never persisted during normal operation
    /// (blocked rounds leave the record untouched), but the codec is total.
    Blocked,
}

impl Citations {
    /// Serialize to the legacy integer encoding used on disk.
    pub fn to_raw(self) -> i64 {
        match self {
            Citations::Cited(n) => i64::from(n),
            Citations::Uninitialized => RAW_UNINITIALIZED,
            Citations::NotFound => RAW_NOT_FOUND,
            Citations::FetchProblem => RAW_FETCH_PROBLEM,
            Citations::Blocked => RAW_BLOCKED,
        }
    }

    /// Decode the legacy integer encoding. Unknown negative values decode
    /// as [`Citations::FetchProblem`] so old files with retired sentinels
    /// still load.
    pub fn from_raw(raw: i64) -> Self {
        match raw {
            n if n >= 0 => Citations::Cited(n.min(i64::from(u32::MAX)) as u32),
            RAW_UNINITIALIZED => Citations::Uninitialized,
            RAW_NOT_FOUND => Citations::NotFound,
            RAW_BLOCKED => Citations::Blocked,
            _ => Citations::FetchProblem,
        }
    }

    /// A known-good count, i.e. strictly positive. Only positive counts are
    /// protected against regression to a non-positive result.
    pub fn is_positive(self) -> bool {
        matches!(self, Citations::Cited(n) if n > 0)
    }
}

impl fmt::Display for Citations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Citations::Cited(n) => write!(f, "{}", n),
            Citations::Uninitialized => write!(f, "uninitialized"),
            Citations::NotFound => write!(f, "not-found"),
            Citations::FetchProblem => write!(f, "fetch-problem"),
            Citations::Blocked => write!(f, "blocked"),
        }
    }
}

/// The persisted unit of state for one publication.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitationRecord {
    /// Stable local identifier (the bibliography entry key).
    pub key: String,
    /// Title used both as the search query and as the fuzzy-match target.
    pub title: String,
    pub citations: Citations,
    /// Milliseconds since epoch of the last completed refresh attempt.
    pub last_update: i64,
}

/// How a refresh attempt changed (or refused to change) a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshStatus {
    /// The new result was adopted.
    Updated { old: Citations, new: Citations },
    /// A positive count would have dropped to a non-positive result. The
    /// live record keeps the old count (only `last_update` advanced);
    /// `previous` is the pre-refresh snapshot for the problems log.
    Regressed { previous: CitationRecord },
    /// Robot detection fired; the record is completely untouched so it is
    /// retried right after the long backoff instead of being starved.
    Blocked,
}

impl CitationRecord {
    /// A record that has never been fetched.
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            citations: Citations::Uninitialized,
            last_update: 0,
        }
    }

    /// Fetch a fresh count for this record and apply it.
    pub async fn refresh(
        &mut self,
        source: &dyn CitationSource,
        client: &reqwest::Client,
        timeout: Duration,
        now_ms: i64,
    ) -> RefreshStatus {
        let result = source.fetch(&self.title, client, timeout).await;
        self.apply_fetch(result, now_ms)
    }

    /// Apply the result of a fetch attempt.
    ///
    /// A known-good (positive) count is never silently overwritten by a
    /// non-positive result: the drop is reported as a regression and the
    /// old count stays in place. Everything except a blocked response
    /// advances `last_update` so the record keeps rotating.
    pub fn apply_fetch(
        &mut self,
        result: Result<FetchOutcome, FetchError>,
        now_ms: i64,
    ) -> RefreshStatus {
        let old = self.citations;
        let new = match result {
            Ok(FetchOutcome::Blocked) => {
                tracing::warn!(key = %self.key, "robot detection fired, record left untouched");
                return RefreshStatus::Blocked;
            }
            Ok(FetchOutcome::Cited(n)) => Citations::Cited(n),
            Ok(FetchOutcome::NotFound) => Citations::NotFound,
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "fetch attempt failed");
                Citations::FetchProblem
            }
        };

        if old.is_positive() && !new.is_positive() {
            let previous = self.clone();
            self.last_update = now_ms;
            tracing::warn!(
                key = %self.key,
                old = %old,
                new = %new,
                "citation count regressed, keeping previous count"
            );
            return RefreshStatus::Regressed { previous };
        }

        self.citations = new;
        self.last_update = now_ms;
        RefreshStatus::Updated { old, new }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(citations: Citations, last_update: i64) -> CitationRecord {
        CitationRecord {
            key: "KCB2012".into(),
            title: "A classification of product-line analyses".into(),
            citations,
            last_update,
        }
    }

    #[test]
    fn test_adopts_new_count() {
        let mut r = record(Citations::Cited(5), 100);
        let status = r.apply_fetch(Ok(FetchOutcome::Cited(7)), 200);
        assert_eq!(r.citations, Citations::Cited(7));
        assert_eq!(r.last_update, 200);
        assert_eq!(
            status,
            RefreshStatus::Updated {
                old: Citations::Cited(5),
                new: Citations::Cited(7),
            }
        );
    }

    #[test]
    fn test_regression_keeps_known_good_count() {
        let mut r = record(Citations::Cited(42), 100);
        let status = r.apply_fetch(Ok(FetchOutcome::NotFound), 200);
        assert_eq!(r.citations, Citations::Cited(42));
        assert_eq!(r.last_update, 200);
        match status {
            RefreshStatus::Regressed { previous } => {
                assert_eq!(previous.citations, Citations::Cited(42));
                assert_eq!(previous.last_update, 100);
            }
            other => panic!("expected regression, got {:?}", other),
        }
    }

    #[test]
    fn test_drop_to_zero_is_a_regression() {
        let mut r = record(Citations::Cited(3), 100);
        let status = r.apply_fetch(Ok(FetchOutcome::Cited(0)), 200);
        assert_eq!(r.citations, Citations::Cited(3));
        assert!(matches!(status, RefreshStatus::Regressed { .. }));
    }

    #[test]
    fn test_fetch_error_does_not_erase_positive_count() {
        let mut r = record(Citations::Cited(9), 100);
        let status = r.apply_fetch(Err(FetchError::Parse("truncated body".into())), 200);
        assert_eq!(r.citations, Citations::Cited(9));
        assert_eq!(r.last_update, 200);
        assert!(matches!(status, RefreshStatus::Regressed { .. }));
    }

    #[test]
    fn test_fetch_error_sets_problem_sentinel() {
        let mut r = record(Citations::Uninitialized, 0);
        r.apply_fetch(Err(FetchError::Parse("truncated body".into())), 200);
        assert_eq!(r.citations, Citations::FetchProblem);
        assert_eq!(r.last_update, 200);
    }

    #[test]
    fn test_not_found_adopted_when_no_known_count() {
        let mut r = record(Citations::Uninitialized, 0);
        r.apply_fetch(Ok(FetchOutcome::NotFound), 200);
        assert_eq!(r.citations, Citations::NotFound);
    }

    #[test]
    fn test_blocked_leaves_record_untouched() {
        let mut r = record(Citations::Cited(11), 100);
        let status = r.apply_fetch(Ok(FetchOutcome::Blocked), 200);
        assert_eq!(status, RefreshStatus::Blocked);
        assert_eq!(r.citations, Citations::Cited(11));
        assert_eq!(r.last_update, 100);
    }

    #[test]
    fn test_raw_round_trip() {
        let values = [
            Citations::Cited(0),
            Citations::Cited(1234),
            Citations::Uninitialized,
            Citations::NotFound,
            Citations::FetchProblem,
            Citations::Blocked,
        ];
        for v in values {
            assert_eq!(Citations::from_raw(v.to_raw()), v);
        }
    }

    #[test]
    fn test_raw_sentinel_values() {
        assert_eq!(Citations::Uninitialized.to_raw(), -1);
        assert_eq!(Citations::NotFound.to_raw(), -2);
        assert_eq!(Citations::FetchProblem.to_raw(), -3);
        assert_eq!(Citations::Blocked.to_raw(), -4);
    }

    #[test]
    fn test_unknown_negative_decodes_as_problem() {
        assert_eq!(Citations::from_raw(-17), Citations::FetchProblem);
    }
}
