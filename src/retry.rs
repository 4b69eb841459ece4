//! Failure classification and bounded exponential backoff.
//!
//! [`decide`] is a pure function from an [`AttemptOutcome`] to a
//! [`RetryDecision`]. [`execute`] wraps an async operation and re-invokes it
//! while the outcome of its error says another attempt may succeed.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Classification of a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Connection-level failure, no HTTP response was received.
    NetworkFailure,
    /// HTTP 429 caused by throttling.
    RateLimited,
    /// HTTP 429 caused by an exhausted account quota.
    QuotaExceeded,
    /// HTTP 5xx.
    ServerError,
    /// HTTP 4xx other than 429, or an invalid request built locally.
    ClientError,
    /// The response body did not decode as the expected JSON.
    ParseFailure,
    /// A web page could not be retrieved.
    FetchFailure,
    /// The caller cancelled the operation.
    Cancelled,
}

/// What went wrong in a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttemptOutcome {
    pub http_status: Option<u16>,
    pub kind: ErrorKind,
}

impl AttemptOutcome {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            http_status: None,
            kind,
        }
    }

    pub fn with_status(kind: ErrorKind, status: u16) -> Self {
        Self {
            http_status: Some(status),
            kind,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryDecision {
    pub should_retry: bool,
}

impl RetryDecision {
    const RETRY: Self = Self { should_retry: true };
    const STOP: Self = Self {
        should_retry: false,
    };
}

/// Decide whether a failed attempt is worth repeating.
///
/// Quota exhaustion and cancellation are terminal whatever the status code.
pub fn decide(outcome: &AttemptOutcome) -> RetryDecision {
    match (outcome.kind, outcome.http_status) {
        (ErrorKind::QuotaExceeded | ErrorKind::Cancelled, _) => RetryDecision::STOP,
        (ErrorKind::NetworkFailure, _) => RetryDecision::RETRY,
        (_, Some(429)) => RetryDecision::RETRY,
        (_, Some(status)) if status >= 500 => RetryDecision::RETRY,
        _ => RetryDecision::STOP,
    }
}

/// Errors the backoff executor knows how to classify.
pub trait Retryable {
    /// Outcome of the attempt that produced this error.
    fn outcome(&self) -> AttemptOutcome;

    /// The error reported when the caller cancels.
    fn cancelled() -> Self;
}

/// Attempt budget and delay schedule for [`execute`].
#[derive(Debug, Clone, PartialEq)]
pub struct Backoff {
    /// Total number of invocations, including the first one.
    pub max_attempts: usize,
    /// Delay before the first retry.
    pub initial_delay: Duration,
    /// Growth factor applied per retry.
    pub multiplier: f64,
    /// Upper bound for a single delay.
    pub max_delay: Duration,
}

impl Backoff {
    pub fn new(
        max_attempts: usize,
        initial_delay: Duration,
        multiplier: f64,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_attempts,
            initial_delay,
            multiplier,
            max_delay,
        }
    }

    /// A schedule that never waits. Mostly useful in tests.
    pub fn immediate(max_attempts: usize) -> Self {
        Self::new(max_attempts, Duration::ZERO, 1.0, Duration::ZERO)
    }

    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as usize) as i32;
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        if capped.is_finite() && capped > 0.0 {
            Duration::from_millis(capped as u64)
        } else {
            Duration::ZERO
        }
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new(7, Duration::from_millis(100), 2.0, Duration::from_secs(10))
    }
}

/// Run `operation` until it succeeds, fails terminally, or the attempt budget
/// runs out.
///
/// The last error is returned as-is once attempts are exhausted. When a
/// cancellation token is given and fires, the pending attempt or wait is
/// abandoned with [`Retryable::cancelled`].
pub async fn execute<T, E, F, Fut>(
    backoff: &Backoff,
    cancel: Option<&CancellationToken>,
    mut operation: F,
) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = backoff.max_attempts.max(1);
    let mut attempt = 0;

    loop {
        attempt += 1;

        let result = match cancel {
            Some(token) => {
                if token.is_cancelled() {
                    return Err(E::cancelled());
                }
                tokio::select! {
                    biased;
                    _ = token.cancelled() => Err(E::cancelled()),
                    result = operation() => result,
                }
            }
            None => operation().await,
        };

        let error = match result {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let outcome = error.outcome();
        if !decide(&outcome).should_retry {
            debug!(?outcome, attempt, "not retrying: {}", error);
            return Err(error);
        }
        if attempt >= max_attempts {
            warn!(attempt, "giving up after {} attempts: {}", attempt, error);
            return Err(error);
        }

        let delay = backoff.delay_for(attempt);
        warn!(
            ?outcome,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "retrying after error: {}",
            error
        );

        match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Err(E::cancelled()),
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            None => tokio::time::sleep(delay).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, PartialEq)]
    struct TestError(ErrorKind, Option<u16>, usize);

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "{:?} ({:?}) on call {}", self.0, self.1, self.2)
        }
    }

    impl Retryable for TestError {
        fn outcome(&self) -> AttemptOutcome {
            AttemptOutcome {
                http_status: self.1,
                kind: self.0,
            }
        }

        fn cancelled() -> Self {
            TestError(ErrorKind::Cancelled, None, 0)
        }
    }

    #[test]
    fn test_quota_exceeded_never_retries() {
        for status in [None, Some(200), Some(400), Some(429), Some(500), Some(503)] {
            let outcome = AttemptOutcome {
                http_status: status,
                kind: ErrorKind::QuotaExceeded,
            };
            assert!(!decide(&outcome).should_retry, "status {:?}", status);
        }
    }

    #[test]
    fn test_server_errors_retry() {
        for status in [500, 502, 503] {
            let outcome = AttemptOutcome::with_status(ErrorKind::ServerError, status);
            assert!(decide(&outcome).should_retry);
        }
    }

    #[test]
    fn test_decide_rules() {
        assert!(decide(&AttemptOutcome::new(ErrorKind::NetworkFailure)).should_retry);
        assert!(decide(&AttemptOutcome::with_status(ErrorKind::RateLimited, 429)).should_retry);
        assert!(!decide(&AttemptOutcome::with_status(ErrorKind::ClientError, 401)).should_retry);
        assert!(!decide(&AttemptOutcome::with_status(ErrorKind::ClientError, 404)).should_retry);
        assert!(!decide(&AttemptOutcome::new(ErrorKind::ParseFailure)).should_retry);
        assert!(!decide(&AttemptOutcome::new(ErrorKind::FetchFailure)).should_retry);
        assert!(!decide(&AttemptOutcome::with_status(ErrorKind::Cancelled, 503)).should_retry);
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let backoff = Backoff::new(
            7,
            Duration::from_millis(100),
            2.0,
            Duration::from_millis(500),
        );
        assert_eq!(backoff.delay_for(1), Duration::from_millis(100));
        assert_eq!(backoff.delay_for(2), Duration::from_millis(200));
        assert_eq!(backoff.delay_for(3), Duration::from_millis(400));
        assert_eq!(backoff.delay_for(4), Duration::from_millis(500));
        assert_eq!(backoff.delay_for(60), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), TestError> = execute(&Backoff::immediate(7), None, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            Err(TestError(ErrorKind::NetworkFailure, None, n))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 7);
        assert_eq!(result, Err(TestError(ErrorKind::NetworkFailure, None, 7)));
    }

    #[tokio::test]
    async fn test_terminal_error_stops_immediately() {
        let calls = AtomicUsize::new(0);
        let result: Result<(), TestError> = execute(&Backoff::immediate(7), None, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(TestError(ErrorKind::QuotaExceeded, Some(429), 1))
        })
        .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().0, ErrorKind::QuotaExceeded);
    }

    #[tokio::test]
    async fn test_recovers_after_transient_failures() {
        let calls = AtomicUsize::new(0);
        let result = execute(&Backoff::immediate(7), None, || async {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            if n < 3 {
                Err(TestError(ErrorKind::ServerError, Some(502), n))
            } else {
                Ok(n)
            }
        })
        .await;

        assert_eq!(result, Ok(3));
    }

    #[tokio::test]
    async fn test_cancelled_token_short_circuits() {
        let token = CancellationToken::new();
        token.cancel();
        let calls = AtomicUsize::new(0);
        let result: Result<(), TestError> =
            execute(&Backoff::immediate(7), Some(&token), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(TestError(ErrorKind::NetworkFailure, None, 1))
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(result.unwrap_err().0, ErrorKind::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_during_wait() {
        let token = CancellationToken::new();
        let backoff = Backoff::new(7, Duration::from_secs(60), 2.0, Duration::from_secs(60));
        let canceller = token.clone();
        let result: Result<(), TestError> = execute(&backoff, Some(&token), || {
            let canceller = canceller.clone();
            async move {
                canceller.cancel();
                Err(TestError(ErrorKind::NetworkFailure, None, 1))
            }
        })
        .await;

        assert_eq!(result.unwrap_err().0, ErrorKind::Cancelled);
    }
}
