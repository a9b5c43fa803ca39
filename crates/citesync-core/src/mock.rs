//! Mock citation source for testing.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use crate::fetcher::{CitationSource, FetchError, FetchFuture, FetchOutcome};

/// A configurable mock response for [`MockSource`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Simulate a successful match with the given count.
    Cited(u32),
    /// Simulate "no candidate cleared the threshold".
    NotFound,
    /// Simulate a robot-detection response.
    Blocked,
    /// Simulate a transport/parse failure.
    Error(String),
}

/// A hand-rolled mock implementing [`CitationSource`] for tests.
///
/// Supports a fixed response or a scripted sequence (one per call, the last
/// repeating when exhausted), plus call counting.
pub struct MockSource {
    /// If non-empty, each call pops the next response.
    responses: Mutex<Vec<MockResponse>>,
    /// Fallback when the sequence is exhausted (or single-response mode).
    fallback: MockResponse,
    call_count: AtomicUsize,
}

impl MockSource {
    /// Create a mock that always returns `response`.
    pub fn new(response: MockResponse) -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            fallback: response,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Create a mock that returns responses in order, repeating the last one.
    pub fn with_sequence(mut responses: Vec<MockResponse>) -> Self {
        assert!(
            !responses.is_empty(),
            "sequence must have at least one response"
        );
        // Reverse so we can pop() from the front cheaply.
        responses.reverse();
        let fallback = responses.first().cloned().unwrap();
        Self {
            responses: Mutex::new(responses),
            fallback,
            call_count: AtomicUsize::new(0),
        }
    }

    /// How many times `fetch()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> MockResponse {
        let mut seq = self.responses.lock().unwrap();
        seq.pop().unwrap_or_else(|| self.fallback.clone())
    }
}

impl CitationSource for MockSource {
    fn name(&self) -> &str {
        "mock"
    }

    fn fetch<'a>(
        &'a self,
        _title: &'a str,
        _client: &'a reqwest::Client,
        _timeout: Duration,
    ) -> FetchFuture<'a> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let response = self.next_response();

        Box::pin(async move {
            match response {
                MockResponse::Cited(n) => Ok(FetchOutcome::Cited(n)),
                MockResponse::NotFound => Ok(FetchOutcome::NotFound),
                MockResponse::Blocked => Ok(FetchOutcome::Blocked),
                MockResponse::Error(msg) => Err(FetchError::Parse(msg)),
            }
        })
    }
}
