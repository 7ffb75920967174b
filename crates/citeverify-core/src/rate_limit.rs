//! Per-source request spacing, adaptive slowdown and bounded retry.
//!
//! Each source call first waits for its governor permit via
//! [`AdaptiveLimiter::acquire`], which spaces requests at the configured
//! rate. On 429 the governor is swapped for a slower one (capped at 16x) and
//! restored after a quiet minute. Transient failures are retried with
//! exponential backoff.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::num::NonZeroU32;
use std::pin::Pin;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arc_swap::ArcSwap;
use governor::clock::{Clock, DefaultClock, FakeRelativeClock, Reference};
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use thiserror::Error;

use crate::db::{SearchQuery, SearchSource};
use citeverify_parsing::CandidateRecord;

/// Maximum slowdown applied after repeated 429 responses.
const MAX_SLOWDOWN: u32 = 16;
/// Quiet period after the last 429 before the base interval is restored.
const DECAY_AFTER: Duration = Duration::from_secs(60);

/// Error from a search source, distinguishing transient from permanent failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    /// Server returned 429 Too Many Requests.
    #[error("rate limited (429)")]
    RateLimited { retry_after: Option<Duration> },
    /// Any other non-success HTTP status.
    #[error("HTTP {status}")]
    Status {
        status: u16,
        retry_after: Option<Duration>,
    },
    #[error("request timed out")]
    Timeout,
    #[error("connection failed: {0}")]
    Connection(String),
    /// The response body could not be decoded.
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("{0}")]
    Other(String),
}

impl SourceError {
    /// Connection/timeout errors, 429 and 5xx are worth retrying; other 4xx never are.
    pub fn is_transient(&self) -> bool {
        match self {
            SourceError::RateLimited { .. } | SourceError::Timeout | SourceError::Connection(_) => {
                true
            }
            SourceError::Status { status, .. } => *status >= 500,
            SourceError::Malformed(_) | SourceError::Other(_) => false,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            SourceError::RateLimited { retry_after } | SourceError::Status { retry_after, .. } => {
                *retry_after
            }
            _ => None,
        }
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            SourceError::Timeout
        } else if err.is_connect() || err.is_request() {
            SourceError::Connection(err.to_string())
        } else if err.is_decode() || err.is_body() {
            SourceError::Malformed(err.to_string())
        } else {
            SourceError::Other(err.to_string())
        }
    }
}

impl From<reqwest::Error> for SourceError {
    fn from(err: reqwest::Error) -> Self {
        SourceError::from_reqwest(&err)
    }
}

/// Map a response status to a [`SourceError`], reading `Retry-After` when present.
pub fn check_response_status(resp: &reqwest::Response) -> Result<(), SourceError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(());
    }
    let retry_after = resp
        .headers()
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after);
    if status.as_u16() == 429 {
        Err(SourceError::RateLimited { retry_after })
    } else {
        Err(SourceError::Status {
            status: status.as_u16(),
            retry_after,
        })
    }
}

/// Parse a Retry-After header value (seconds or HTTP-date).
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(secs) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    // An HTTP-date gets a conservative fixed wait
    if value.contains(',') || value.contains("GMT") {
        return Some(Duration::from_secs(5));
    }
    None
}

// ───────────────── Clock ─────────────────

/// A governor clock that can also put the caller to sleep.
///
/// Limiter waits, backoff and `Retry-After` pauses all go through the same
/// clock, so a [`FakeRelativeClock`] drives every delay in tests.
pub trait LimiterClock: Clock + Clone + Send + Sync + 'static {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

impl LimiterClock for DefaultClock {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Sleeping advances the fake clock instead of waiting.
impl LimiterClock for FakeRelativeClock {
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.advance(duration);
        Box::pin(std::future::ready(()))
    }
}

fn elapsed_since<C: Clock>(clock: &C, earlier: C::Instant) -> Duration {
    Duration::from(clock.now().duration_since(earlier))
}

// ───────────────── AdaptiveLimiter ─────────────────

type DirectLimiter<C> =
    RateLimiter<NotKeyed, InMemoryState, C, NoOpMiddleware<<C as Clock>::Instant>>;

fn quota_for(period: Duration) -> Quota {
    Quota::with_period(period).unwrap_or_else(|| Quota::per_second(NonZeroU32::MIN))
}

/// Per-source governor limiter with adaptive slowdown via [`ArcSwap`].
///
/// On 429 the governor is swapped for one at half the rate (capped at 16x
/// slower). After a quiet minute the base rate is restored.
pub struct AdaptiveLimiter<C: LimiterClock = DefaultClock> {
    limiter: ArcSwap<DirectLimiter<C>>,
    base_period: Duration,
    /// Current slowdown factor (1 = normal, 2 = half rate, ...).
    factor: AtomicU32,
    last_429: Mutex<Option<C::Instant>>,
    clock: C,
}

impl AdaptiveLimiter {
    /// A limiter on the default clock allowing one request per `period`.
    pub fn new(period: Duration) -> Self {
        Self::with_clock(period, DefaultClock::default())
    }

    /// A limiter allowing `n` requests per second.
    pub fn per_second(n: u32) -> Self {
        let ms = 1000 / n.max(1) as u64;
        Self::new(Duration::from_millis(ms))
    }
}

impl<C: LimiterClock> AdaptiveLimiter<C> {
    pub fn with_clock(period: Duration, clock: C) -> Self {
        let limiter = DirectLimiter::direct_with_clock(quota_for(period), clock.clone());
        Self {
            limiter: ArcSwap::from_pointee(limiter),
            base_period: period,
            factor: AtomicU32::new(1),
            last_429: Mutex::new(None),
            clock,
        }
    }

    pub fn base_period(&self) -> Duration {
        self.base_period
    }

    /// The period currently enforced, including any 429 slowdown.
    pub fn current_period(&self) -> Duration {
        self.base_period * self.slowdown_factor()
    }

    pub fn slowdown_factor(&self) -> u32 {
        self.factor.load(Ordering::SeqCst)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Wait until the governor admits a request.
    pub async fn acquire(&self) {
        self.try_decay();
        let limiter = self.limiter.load_full();
        while let Err(not_until) = limiter.check() {
            let wait = not_until.wait_time_from(self.clock.now());
            tracing::trace!(wait_ms = wait.as_millis() as u64, "rate limiter wait");
            self.clock.sleep(wait).await;
        }
    }

    /// Called when a 429 is received. Doubles the slowdown and swaps the governor.
    pub fn on_rate_limited(&self) {
        *self.last_429.lock().unwrap_or_else(PoisonError::into_inner) = Some(self.clock.now());

        let _ = self
            .factor
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |f| {
                Some((f * 2).min(MAX_SLOWDOWN))
            });
        let factor = self.slowdown_factor();
        if let Some(scaled) = self.base_period.checked_mul(factor)
            && let Some(quota) = Quota::with_period(scaled)
        {
            self.swap(quota);
        }
        tracing::info!(factor, "rate limited, slowing down");
    }

    /// Restore the base rate once a minute has passed since the last 429.
    fn try_decay(&self) {
        let last_429 = *self.last_429.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = last_429.is_some_and(|t| elapsed_since(&self.clock, t) >= DECAY_AFTER);

        if expired && self.factor.swap(1, Ordering::SeqCst) > 1 {
            tracing::debug!("rate limit slowdown expired, restoring base rate");
            self.swap(quota_for(self.base_period));
        }
    }

    fn swap(&self, quota: Quota) {
        let limiter = DirectLimiter::direct_with_clock(quota, self.clock.clone());
        self.limiter.store(Arc::new(limiter));
    }
}

impl<C: LimiterClock> fmt::Debug for AdaptiveLimiter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AdaptiveLimiter")
            .field("base_period", &self.base_period)
            .field("factor", &self.slowdown_factor())
            .finish()
    }
}

/// Collection of per-source rate limiters sharing one clock.
pub struct RateLimiters<C: LimiterClock = DefaultClock> {
    limiters: HashMap<String, AdaptiveLimiter<C>>,
    clock: C,
}

impl<C: LimiterClock> fmt::Debug for RateLimiters<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.limiters.iter()).finish()
    }
}

impl Default for RateLimiters {
    fn default() -> Self {
        Self::new(false, false)
    }
}

impl RateLimiters {
    /// Build limiters based on whether a CrossRef mailto / S2 API key is configured.
    pub fn new(has_crossref_mailto: bool, has_s2_api_key: bool) -> Self {
        Self::with_clock(DefaultClock::default(), has_crossref_mailto, has_s2_api_key)
    }
}

impl<C: LimiterClock> RateLimiters<C> {
    pub fn with_clock(clock: C, has_crossref_mailto: bool, has_s2_api_key: bool) -> Self {
        let ms = |n: u64| Duration::from_millis(n);
        let periods = [
            // CrossRef polite pool is faster with a mailto
            ("CrossRef", if has_crossref_mailto { ms(334) } else { ms(1000) }),
            // Keyless S2 allows roughly one request every 3 seconds
            (
                "Semantic Scholar",
                if has_s2_api_key { ms(1000) } else { ms(3000) },
            ),
            ("CiNii", ms(1000)),
            ("NDL", ms(1000)),
            ("Google Books", ms(500)),
        ];
        let limiters = periods
            .into_iter()
            .map(|(name, period)| {
                (
                    name.to_string(),
                    AdaptiveLimiter::with_clock(period, clock.clone()),
                )
            })
            .collect();
        Self { limiters, clock }
    }

    /// Get the limiter for a source, if one exists.
    pub fn get(&self, source: &str) -> Option<&AdaptiveLimiter<C>> {
        self.limiters.get(source)
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

// ───────────────── Retry ─────────────────

/// Bounded retry with exponential backoff and jitter.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first.
    pub max_attempts: u32,
    pub base_backoff: Duration,
    pub max_backoff: Duration,
    /// Upper bound on an honored `Retry-After`.
    pub max_retry_after: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            max_retry_after: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `attempt + 1`: base * 2^(attempt-1) plus up to 25% jitter.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = self
            .base_backoff
            .saturating_mul(1u32 << attempt.saturating_sub(1).min(16));
        let capped = exp.min(self.max_backoff);
        capped + capped.mul_f64(fastrand::f64() * 0.25)
    }

    fn delay_for(&self, attempt: u32, err: &SourceError) -> Duration {
        match err.retry_after() {
            Some(after) => after.min(self.max_retry_after),
            None => self.backoff(attempt),
        }
    }
}

/// Run `op` until it succeeds, fails permanently, or attempts run out.
///
/// The limiter (if any) is acquired before every attempt and slowed on 429.
/// Backoff and `Retry-After` waits sleep on `clock`.
pub async fn retry_with_policy<T, F, Fut, C>(
    source: &str,
    policy: &RetryPolicy,
    limiter: Option<&AdaptiveLimiter<C>>,
    clock: &C,
    mut op: F,
) -> Result<T, SourceError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
    C: LimiterClock,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        if let Some(lim) = limiter {
            lim.acquire().await;
        }

        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if matches!(err, SourceError::RateLimited { .. })
            && let Some(lim) = limiter
        {
            lim.on_rate_limited();
        }

        if !err.is_transient() || attempt >= max_attempts {
            tracing::debug!(source, attempt, error = %err, "giving up");
            return Err(err);
        }

        let delay = policy.delay_for(attempt, &err);
        tracing::info!(
            source,
            attempt,
            error = %err,
            delay_ms = delay.as_millis() as u64,
            "transient failure, retrying"
        );
        clock.sleep(delay).await;
        attempt += 1;
    }
}

/// Query a source with rate limiting and the retry policy.
pub async fn query_with_retry(
    source: &dyn SearchSource,
    query: &SearchQuery,
    client: &reqwest::Client,
    timeout: Duration,
    rate_limiters: &RateLimiters,
    policy: &RetryPolicy,
) -> Result<Vec<CandidateRecord>, SourceError> {
    let limiter = if source.is_local() {
        None
    } else {
        rate_limiters.get(source.name())
    };
    retry_with_policy(source.name(), policy, limiter, rate_limiters.clock(), |_| {
        source.search(query, client, timeout)
    })
    .await
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── parse_retry_after ──────────────────────────────────────────────

    #[test]
    fn parse_integer_seconds() {
        assert_eq!(parse_retry_after("5"), Some(Duration::from_secs(5)));
        assert_eq!(parse_retry_after(" 0 "), Some(Duration::from_secs(0)));
    }

    #[test]
    fn parse_http_date() {
        let val = "Wed, 21 Oct 2015 07:28:00 GMT";
        assert_eq!(parse_retry_after(val), Some(Duration::from_secs(5)));
    }

    #[test]
    fn parse_garbage_none() {
        assert_eq!(parse_retry_after("xyz"), None);
    }

    // ── check_response_status ──────────────────────────────────────────

    fn response(status: u16, retry_after: Option<&str>) -> reqwest::Response {
        let mut builder = http::Response::builder().status(status);
        if let Some(value) = retry_after {
            builder = builder.header("retry-after", value);
        }
        reqwest::Response::from(builder.body("").unwrap())
    }

    #[test]
    fn ok_on_200() {
        assert!(check_response_status(&response(200, None)).is_ok());
    }

    #[test]
    fn rate_limited_with_retry_after() {
        let err = check_response_status(&response(429, Some("10"))).unwrap_err();
        assert_eq!(
            err,
            SourceError::RateLimited {
                retry_after: Some(Duration::from_secs(10))
            }
        );
        assert!(err.is_transient());
    }

    #[test]
    fn server_errors_are_transient() {
        let err = check_response_status(&response(503, Some("2"))).unwrap_err();
        assert!(err.is_transient());
        assert_eq!(err.retry_after(), Some(Duration::from_secs(2)));
        assert!(check_response_status(&response(500, None)).unwrap_err().is_transient());
    }

    #[test]
    fn client_errors_are_permanent() {
        for status in [400, 401, 403, 404] {
            let err = check_response_status(&response(status, None)).unwrap_err();
            assert!(!err.is_transient(), "{status} should not be retried");
        }
    }

    // ── AdaptiveLimiter ────────────────────────────────────────────────

    fn elapsed(clock: &FakeRelativeClock, start: <FakeRelativeClock as Clock>::Instant) -> Duration {
        elapsed_since(clock, start)
    }

    #[tokio::test]
    async fn first_acquire_does_not_wait() {
        let clock = FakeRelativeClock::default();
        let limiter = AdaptiveLimiter::with_clock(Duration::from_secs(1), clock.clone());
        let start = clock.now();
        limiter.acquire().await;
        assert_eq!(elapsed(&clock, start), Duration::ZERO);
    }

    #[tokio::test]
    async fn spaces_consecutive_requests() {
        let clock = FakeRelativeClock::default();
        let limiter = AdaptiveLimiter::with_clock(Duration::from_secs(1), clock.clone());
        let start = clock.now();
        limiter.acquire().await;
        limiter.acquire().await;
        let waited = elapsed(&clock, start);
        assert!(waited >= Duration::from_secs(1), "waited {waited:?}");
        assert!(waited < Duration::from_secs(2), "waited {waited:?}");
    }

    #[tokio::test]
    async fn no_wait_after_period_elapsed() {
        let clock = FakeRelativeClock::default();
        let limiter = AdaptiveLimiter::with_clock(Duration::from_secs(1), clock.clone());
        limiter.acquire().await;
        clock.advance(Duration::from_secs(2));
        let start = clock.now();
        limiter.acquire().await;
        assert_eq!(elapsed(&clock, start), Duration::ZERO);
    }

    #[test]
    fn slowdown_doubles_and_caps() {
        let limiter =
            AdaptiveLimiter::with_clock(Duration::from_millis(100), FakeRelativeClock::default());
        assert_eq!(limiter.slowdown_factor(), 1);
        limiter.on_rate_limited();
        assert_eq!(limiter.current_period(), Duration::from_millis(200));
        for _ in 0..10 {
            limiter.on_rate_limited();
        }
        assert_eq!(limiter.slowdown_factor(), 16);
    }

    #[tokio::test]
    async fn slowdown_decays_after_quiet_minute() {
        let clock = FakeRelativeClock::default();
        let limiter = AdaptiveLimiter::with_clock(Duration::from_millis(100), clock.clone());
        limiter.on_rate_limited();
        limiter.on_rate_limited();
        assert_eq!(limiter.slowdown_factor(), 4);

        clock.advance(Duration::from_secs(61));
        limiter.acquire().await;
        assert_eq!(limiter.slowdown_factor(), 1);
    }

    #[tokio::test]
    async fn slowdown_kept_within_quiet_minute() {
        let clock = FakeRelativeClock::default();
        let limiter = AdaptiveLimiter::with_clock(Duration::from_millis(100), clock.clone());
        limiter.on_rate_limited();
        clock.advance(Duration::from_secs(30));
        limiter.acquire().await;
        assert_eq!(limiter.slowdown_factor(), 2);
    }

    // ── RateLimiters ───────────────────────────────────────────────────

    #[test]
    fn default_has_expected_sources() {
        let limiters = RateLimiters::default();
        for name in ["CrossRef", "Semantic Scholar", "CiNii", "NDL", "Google Books"] {
            assert!(limiters.get(name).is_some(), "missing limiter for {name}");
        }
        assert!(limiters.get("FakeDB").is_none());
    }

    #[test]
    fn crossref_rate_varies_with_mailto() {
        let without = RateLimiters::new(false, false);
        let with = RateLimiters::new(true, false);
        assert!(
            with.get("CrossRef").unwrap().base_period()
                < without.get("CrossRef").unwrap().base_period()
        );
    }

    // ── retry_with_policy ──────────────────────────────────────────────

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy::default();
        let first = policy.backoff(1);
        assert!(first >= Duration::from_millis(500) && first <= Duration::from_millis(625));
        let second = policy.backoff(2);
        assert!(second >= Duration::from_millis(1000) && second <= Duration::from_millis(1250));
        assert!(policy.backoff(20) <= Duration::from_secs(10));
    }

    #[tokio::test]
    async fn retries_transient_then_succeeds() {
        let clock = FakeRelativeClock::default();
        let calls = AtomicU32::new(0);
        let start = clock.now();
        let result = retry_with_policy("Test", &RetryPolicy::default(), None, &clock, |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(SourceError::Timeout)
                } else {
                    Ok(n)
                }
            }
        })
        .await;
        assert_eq!(result, Ok(1));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        // one backoff of 500ms plus up to 25% jitter
        let waited = elapsed(&clock, start);
        assert!(waited >= Duration::from_millis(500) && waited <= Duration::from_millis(625));
    }

    #[tokio::test]
    async fn stops_after_max_attempts() {
        let clock = FakeRelativeClock::default();
        let calls = AtomicU32::new(0);
        let result: Result<(), _> =
            retry_with_policy("Test", &RetryPolicy::default(), None, &clock, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(SourceError::Status {
                        status: 503,
                        retry_after: None,
                    })
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn never_retries_client_errors() {
        let clock = FakeRelativeClock::default();
        let calls = AtomicU32::new(0);
        let start = clock.now();
        let result: Result<(), _> =
            retry_with_policy("Test", &RetryPolicy::default(), None, &clock, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(SourceError::Status {
                        status: 404,
                        retry_after: None,
                    })
                }
            })
            .await;
        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(elapsed(&clock, start), Duration::ZERO);
    }

    #[tokio::test]
    async fn honors_retry_after_and_slows_limiter() {
        let clock = FakeRelativeClock::default();
        let limiter = AdaptiveLimiter::with_clock(Duration::from_millis(100), clock.clone());
        let calls = AtomicU32::new(0);
        let start = clock.now();

        let result = retry_with_policy("Test", &RetryPolicy::default(), Some(&limiter), &clock, |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(SourceError::RateLimited {
                        retry_after: Some(Duration::from_secs(7)),
                    })
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert!(elapsed(&clock, start) >= Duration::from_secs(7));
        assert_eq!(limiter.slowdown_factor(), 2);
    }

    #[tokio::test]
    async fn retry_after_is_capped() {
        let clock = FakeRelativeClock::default();
        let policy = RetryPolicy {
            max_attempts: 2,
            max_retry_after: Duration::from_secs(3),
            ..Default::default()
        };
        let start = clock.now();
        let result: Result<(), _> = retry_with_policy("Test", &policy, None, &clock, |_| async {
            Err(SourceError::RateLimited {
                retry_after: Some(Duration::from_secs(600)),
            })
        })
        .await;
        assert!(result.is_err());
        assert_eq!(elapsed(&clock, start), Duration::from_secs(3));
    }
}
