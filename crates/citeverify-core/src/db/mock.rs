//! Scripted search source for testing.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use citeverify_parsing::CandidateRecord;

use super::{SearchFuture, SearchQuery, SearchSource};
use crate::rate_limit::SourceError;

/// A configurable mock response for [`MockSource`].
#[derive(Clone, Debug)]
pub enum MockResponse {
    /// Return these records.
    Records(Vec<CandidateRecord>),
    /// Simulate a 429 rate-limit response.
    RateLimited { retry_after: Option<Duration> },
    /// Simulate a non-success HTTP status.
    Status(u16),
    /// Simulate a request timeout.
    Timeout,
}

impl MockResponse {
    pub fn empty() -> Self {
        MockResponse::Records(Vec::new())
    }
}

/// A hand-rolled mock implementing [`SearchSource`] for tests.
///
/// Returns a fixed response for every call, or a sequence of responses (one
/// per call, repeating the last when exhausted). Every call is counted and its
/// query recorded.
pub struct MockSource {
    name: String,
    /// Remaining sequence, reversed so `pop()` yields the next response.
    responses: Mutex<Vec<MockResponse>>,
    fallback: MockResponse,
    delay: Option<Duration>,
    call_count: AtomicUsize,
    queries: Mutex<Vec<SearchQuery>>,
}

impl MockSource {
    /// Create a mock that always returns `response`.
    pub fn new(name: impl Into<String>, response: MockResponse) -> Self {
        Self {
            name: name.into(),
            responses: Mutex::new(Vec::new()),
            fallback: response,
            delay: None,
            call_count: AtomicUsize::new(0),
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that always returns `records`.
    pub fn with_records(name: impl Into<String>, records: Vec<CandidateRecord>) -> Self {
        Self::new(name, MockResponse::Records(records))
    }

    /// Create a mock that returns responses in order, repeating the last one.
    /// An empty sequence behaves like an empty result.
    pub fn with_sequence(name: impl Into<String>, mut responses: Vec<MockResponse>) -> Self {
        let fallback = responses.last().cloned().unwrap_or_else(MockResponse::empty);
        responses.reverse();
        Self {
            responses: Mutex::new(responses),
            fallback,
            ..Self::new(name, MockResponse::empty())
        }
    }

    /// Set simulated network latency per call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// How many times `search()` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    /// Every query received, in call order.
    pub fn queries(&self) -> Vec<SearchQuery> {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn next_response(&self) -> MockResponse {
        let mut seq = self.responses.lock().unwrap_or_else(PoisonError::into_inner);
        seq.pop().unwrap_or_else(|| self.fallback.clone())
    }
}

impl SearchSource for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn search<'a>(
        &'a self,
        query: &'a SearchQuery,
        _client: &'a reqwest::Client,
        _timeout: Duration,
    ) -> SearchFuture<'a> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(query.clone());
        let response = self.next_response();
        let delay = self.delay;
        let name = self.name.clone();

        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }

            match response {
                MockResponse::Records(records) => Ok(records
                    .into_iter()
                    .map(|mut r| {
                        if r.source.is_empty() {
                            r.source = name.clone();
                        }
                        r
                    })
                    .collect()),
                MockResponse::RateLimited { retry_after } => {
                    Err(SourceError::RateLimited { retry_after })
                }
                MockResponse::Status(status) => Err(SourceError::Status {
                    status,
                    retry_after: None,
                }),
                MockResponse::Timeout => Err(SourceError::Timeout),
            }
        })
    }
}
