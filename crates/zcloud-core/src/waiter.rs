//! State-transition waiter.
//!
//! Resources converge through vendor-side state machines (PENDING →
//! CREATING → RUNNING, and so on). A [`StateWaiter`] polls a refresh
//! function until the observed status lands in the target set, fails fast on
//! a failure status, and tolerates a bounded number of not-found reads for
//! objects that are still materializing or already disappearing.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Safety margin subtracted from host-supplied operation timeouts so the
/// waiter reports before the host cuts the connection.
pub const DEADLINE_SAFETY_MARGIN: Duration = Duration::from_secs(60);

/// Default delay before the first refresh.
pub const DEFAULT_INITIAL_DELAY: Duration = Duration::from_secs(10);

/// Default minimum interval between refreshes.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_secs(5);

/// Poll a refresh function until a target status is observed.
#[derive(Debug, Clone)]
pub struct StateWaiter<'a> {
    /// Statuses the resource is allowed to pass through.
    pub pending: &'a [&'a str],
    /// Statuses that complete the wait.
    pub target: &'a [&'a str],
    /// Statuses that fail the wait immediately.
    pub failure: &'a [&'a str],
    /// Hard deadline for the whole wait.
    pub timeout: Duration,
    /// Delay before the first refresh.
    pub initial_delay: Duration,
    /// Minimum interval between refreshes.
    pub min_interval: Duration,
    /// Number of consecutive nil reads tolerated before the object is
    /// considered gone.
    pub not_found_checks: u32,
}

impl<'a> StateWaiter<'a> {
    pub fn new(pending: &'a [&'a str], target: &'a [&'a str], timeout: Duration) -> Self {
        Self {
            pending,
            target,
            failure: &[],
            timeout: timeout.saturating_sub(DEADLINE_SAFETY_MARGIN),
            initial_delay: DEFAULT_INITIAL_DELAY,
            min_interval: DEFAULT_MIN_INTERVAL,
            not_found_checks: 3,
        }
    }

    pub fn with_failure(mut self, failure: &'a [&'a str]) -> Self {
        self.failure = failure;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_not_found_checks(mut self, checks: u32) -> Self {
        self.not_found_checks = checks;
        self
    }

    /// Run the wait. `refresh` returns `Ok(None)` when the object cannot be
    /// found, otherwise the object and its current status.
    ///
    /// Returns `Ok(Some(obj))` once a target status is observed, and
    /// `Ok(None)` when the not-found tolerance was exhausted (the object is
    /// gone, which is the success path for deletion waits).
    pub async fn wait_for<T, E, F, Fut>(&self, mut refresh: F) -> Result<Option<T>, WaitError<E>>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<(T, String)>, E>>,
    {
        let started = Instant::now();
        let mut not_found = 0u32;
        let mut last_status: Option<String> = None;

        tokio::time::sleep(self.initial_delay).await;

        loop {
            match refresh().await.map_err(WaitError::Refresh)? {
                None => {
                    not_found += 1;
                    if not_found > self.not_found_checks {
                        return Ok(None);
                    }
                }
                Some((obj, status)) => {
                    not_found = 0;
                    tracing::debug!(status, "observed resource status");
                    if self.target.contains(&status.as_str()) {
                        return Ok(Some(obj));
                    }
                    if self.failure.contains(&status.as_str()) {
                        return Err(WaitError::FailureState { status });
                    }
                    if !self.pending.contains(&status.as_str()) {
                        return Err(WaitError::UnexpectedState { status });
                    }
                    last_status = Some(status);
                }
            }

            if started.elapsed() + self.min_interval >= self.timeout {
                return Err(WaitError::Timeout { last_status });
            }
            tokio::time::sleep(self.min_interval).await;
        }
    }
}

/// Failure of a state wait.
#[derive(Debug, Error)]
pub enum WaitError<E: Display> {
    /// The resource entered a declared failure status.
    #[error("resource entered failure state {status}")]
    FailureState { status: String },

    /// The resource reported a status outside pending ∪ target ∪ failure.
    #[error("resource entered unexpected state {status}")]
    UnexpectedState { status: String },

    /// Deadline passed; carries the last status seen, if any.
    #[error("timeout waiting for resource state (last seen: {})", last_status.as_deref().unwrap_or("none"))]
    Timeout { last_status: Option<String> },

    /// The refresh function itself failed.
    #[error(transparent)]
    Refresh(E),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn waiter<'a>(timeout_ms: u64) -> StateWaiter<'a> {
        StateWaiter {
            pending: &["CREATING"],
            target: &["RUNNING"],
            failure: &["CREATE_FAILED"],
            timeout: Duration::from_millis(timeout_ms),
            initial_delay: Duration::from_millis(1),
            min_interval: Duration::from_millis(1),
            not_found_checks: 2,
        }
    }

    #[tokio::test]
    async fn reaches_target_through_pending() {
        let step = AtomicUsize::new(0);
        let got = waiter(5_000)
            .wait_for(|| {
                let n = step.fetch_add(1, Ordering::SeqCst);
                async move {
                    Ok::<_, Infallible>(Some(match n {
                        0 | 1 => ("obj", "CREATING".to_string()),
                        _ => ("obj", "RUNNING".to_string()),
                    }))
                }
            })
            .await
            .unwrap();
        assert_eq!(got, Some("obj"));
    }

    #[tokio::test]
    async fn failure_state_includes_status() {
        let err = waiter(5_000)
            .wait_for(|| async { Ok::<_, Infallible>(Some(((), "CREATE_FAILED".to_string()))) })
            .await
            .unwrap_err();
        match err {
            WaitError::FailureState { status } => assert_eq!(status, "CREATE_FAILED"),
            other => panic!("unexpected: {other}"),
        }
    }

    #[tokio::test]
    async fn unexpected_state_is_terminal() {
        let err = waiter(5_000)
            .wait_for(|| async { Ok::<_, Infallible>(Some(((), "RECYCLE".to_string()))) })
            .await
            .unwrap_err();
        assert!(matches!(err, WaitError::UnexpectedState { .. }));
    }

    #[tokio::test]
    async fn not_found_tolerance_then_gone() {
        let calls = AtomicUsize::new(0);
        let got: Option<()> = waiter(5_000)
            .wait_for(|| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok::<_, Infallible>(None) }
            })
            .await
            .unwrap();
        assert_eq!(got, None);
        // tolerance of 2 means the third nil read concludes the wait
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn intermittent_not_found_resets_counter() {
        let step = AtomicUsize::new(0);
        let got = waiter(5_000)
            .wait_for(|| {
                let n = step.fetch_add(1, Ordering::SeqCst);
                async move {
                    Ok::<_, Infallible>(match n {
                        0 | 1 => None,
                        2 => Some(("obj", "CREATING".to_string())),
                        3 => None,
                        _ => Some(("obj", "RUNNING".to_string())),
                    })
                }
            })
            .await
            .unwrap();
        assert_eq!(got, Some("obj"));
    }

    #[tokio::test]
    async fn timeout_reports_last_status() {
        let err: WaitError<Infallible> = waiter(10)
            .wait_for(|| async { Ok(Some(((), "CREATING".to_string()))) })
            .await
            .unwrap_err();
        match err {
            WaitError::Timeout { last_status } => {
                assert_eq!(last_status.as_deref(), Some("CREATING"))
            }
            other => panic!("unexpected: {other}"),
        }
    }
}
