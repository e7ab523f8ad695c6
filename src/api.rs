//! Shared HTTP plumbing: attempt classification and the retry loop.
//!
//! Calls to the news and generative services return an [`Attempt`] that says
//! whether the call succeeded, failed in a way worth retrying, or failed for
//! good. [`RetryPolicy::run`] drives the attempts from the outside with
//! exponential backoff and jitter.
//!
//! # Backoff Strategy
//!
//! ```text
//! delay = min(base_delay * 2^(attempt-1), max_delay) + random_jitter(0..250ms)
//! ```

use rand::{Rng, rng};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{error, warn};
use url::Url;

/// Result of a single call attempt.
#[derive(Debug)]
pub enum Attempt<T, E> {
    Success(T),
    /// Transient failure (timeout, transport error, rate limit, 5xx).
    Retryable(E),
    /// Permanent failure; retrying would not help.
    Fatal(E),
}

/// Why [`RetryPolicy::run`] gave up.
#[derive(Debug, PartialEq)]
pub enum RetryError<E> {
    Fatal(E),
    Exhausted { attempts: usize, last: E },
}

/// Retry bound and backoff curve for one kind of call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: usize,
    /// Initial delay between attempts (doubles with each attempt).
    pub base_delay_ms: u64,
    /// Upper bound on the computed delay, before jitter.
    pub max_delay_ms: u64,
    /// Upper bound on the random jitter added to each delay.
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_ms: 250,
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: usize) -> Duration {
        let shift = attempt.saturating_sub(1).min(20) as u32;
        let delay = Duration::from_millis(self.base_delay_ms)
            .saturating_mul(1u32 << shift)
            .min(Duration::from_millis(self.max_delay_ms));
        let jitter_ms = if self.jitter_ms == 0 {
            0
        } else {
            rng().random_range(0..=self.jitter_ms)
        };
        delay + Duration::from_millis(jitter_ms)
    }

    /// Run `op` until it succeeds, fails fatally, or the attempt budget is spent.
    ///
    /// `op` receives the 1-based attempt number. `what` names the call in logs.
    pub async fn run<T, E, F, Fut>(&self, what: &str, mut op: F) -> Result<T, RetryError<E>>
    where
        E: fmt::Display,
        F: FnMut(usize) -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
    {
        let total_t0 = Instant::now();
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 0usize;

        loop {
            attempt += 1;
            let attempt_t0 = Instant::now();
            match op(attempt).await {
                Attempt::Success(value) => return Ok(value),
                Attempt::Fatal(e) => {
                    error!(call = what, attempt, error = %e, "call failed permanently");
                    return Err(RetryError::Fatal(e));
                }
                Attempt::Retryable(e) => {
                    if attempt >= max_attempts {
                        error!(
                            call = what,
                            attempt,
                            max = max_attempts,
                            elapsed_ms_total = total_t0.elapsed().as_millis(),
                            error = %e,
                            "call exhausted retries"
                        );
                        return Err(RetryError::Exhausted { attempts: attempt, last: e });
                    }

                    let delay = self.backoff(attempt);
                    warn!(
                        call = what,
                        attempt,
                        max = max_attempts,
                        elapsed_ms_attempt = attempt_t0.elapsed().as_millis(),
                        ?delay,
                        error = %e,
                        "call attempt failed; backing off"
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}

/// Whether an HTTP status is worth retrying.
pub fn is_retryable_status(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS
        || status == StatusCode::REQUEST_TIMEOUT
        || status.is_server_error()
}

/// Describe a transport-level reqwest error for logs and reports.
pub fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {e}")
    } else if e.is_connect() {
        format!("connection failed: {e}")
    } else {
        format!("transport error: {e}")
    }
}

/// Join `path` onto `base`, keeping any path prefix `base` already has.
pub fn join_path(base: &Url, path: &str) -> Result<Url, url::ParseError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path)
}

/// Build an HTTP client with a whole-request timeout.
pub fn build_client(timeout: Duration) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn fast_policy(max_attempts: usize) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
            jitter_ms: 0,
        }
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let p = RetryPolicy {
            max_attempts: 10,
            base_delay_ms: 1_000,
            max_delay_ms: 5_000,
            jitter_ms: 0,
        };
        assert_eq!(p.backoff(1), Duration::from_secs(1));
        assert_eq!(p.backoff(2), Duration::from_secs(2));
        assert_eq!(p.backoff(3), Duration::from_secs(4));
        assert_eq!(p.backoff(4), Duration::from_secs(5));
        assert_eq!(p.backoff(60), Duration::from_secs(5));
    }

    #[test]
    fn test_backoff_jitter_is_bounded() {
        let p = RetryPolicy {
            jitter_ms: 250,
            ..fast_policy(3)
        };
        for _ in 0..20 {
            let d = p.backoff(1);
            assert!(d >= Duration::from_millis(1_000));
            assert!(d <= Duration::from_millis(1_250));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_retries_then_succeeds() {
        let calls = AtomicUsize::new(0);
        let result: Result<&str, RetryError<String>> = fast_policy(3)
            .run("test", |attempt| {
                calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 3 {
                        Attempt::Retryable(format!("attempt {attempt} failed"))
                    } else {
                        Attempt::Success("ok")
                    }
                }
            })
            .await;
        assert_eq!(result, Ok("ok"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_stops_on_fatal() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), RetryError<String>> = fast_policy(5)
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Attempt::Fatal("bad request".to_string()) }
            })
            .await;
        assert_eq!(result, Err(RetryError::Fatal("bad request".to_string())));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_exhausts_budget() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), RetryError<String>> = fast_policy(3)
            .run("test", |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Attempt::Retryable("503".to_string()) }
            })
            .await;
        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 3,
                last: "503".to_string()
            })
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_join_path_keeps_prefix() {
        let base = Url::parse("http://localhost:1234/proxy").unwrap();
        let url = join_path(&base, "api/v1/article/getArticles").unwrap();
        assert_eq!(url.as_str(), "http://localhost:1234/proxy/api/v1/article/getArticles");

        let root = Url::parse("https://generativelanguage.googleapis.com").unwrap();
        let url = join_path(&root, "v1beta/models/gemini-1.5-flash:generateContent").unwrap();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash:generateContent"
        );
    }

    #[test]
    fn test_retryable_statuses() {
        assert!(is_retryable_status(StatusCode::TOO_MANY_REQUESTS));
        assert!(is_retryable_status(StatusCode::BAD_GATEWAY));
        assert!(is_retryable_status(StatusCode::SERVICE_UNAVAILABLE));
        assert!(!is_retryable_status(StatusCode::BAD_REQUEST));
        assert!(!is_retryable_status(StatusCode::UNAUTHORIZED));
        assert!(!is_retryable_status(StatusCode::NOT_FOUND));
    }
}
