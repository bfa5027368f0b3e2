//! Bounded retry with jittered exponential backoff.
//!
//! Every mutating API call a reconciler issues is wrapped in [`retry`]. The
//! loop runs until the call succeeds, the caller's deadline passes, or the
//! failure is classified terminal.

use crate::classify::{classify, code_is_retryable, ErrorClass, VendorFault};
use rand::Rng;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Retry parameters. Defaults mirror the conservative client-side values the
/// vendor recommends; the timeout always comes from the operation config.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Hard deadline for the whole loop.
    pub timeout: Duration,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Ceiling for the backoff delay.
    pub max_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub backoff_multiplier: f64,
    /// Vendor codes retryable for this operation in addition to the global
    /// set.
    pub extra_retryable: &'static [&'static str],
}

impl RetryPolicy {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            extra_retryable: &[],
        }
    }

    pub fn with_extra_retryable(mut self, codes: &'static [&'static str]) -> Self {
        self.extra_retryable = codes;
        self
    }
}

/// Failure of a retried operation.
#[derive(Debug, Error)]
pub enum RetryError<E: Display> {
    /// The deadline passed; carries the error from the last attempt.
    #[error("retry deadline exceeded after {elapsed:?}: {last}")]
    DeadlineExceeded { elapsed: Duration, last: E },

    /// The failure is not retryable.
    #[error(transparent)]
    Terminal(E),
}

impl<E: Display> RetryError<E> {
    /// The underlying error from the final attempt.
    pub fn into_inner(self) -> E {
        match self {
            RetryError::DeadlineExceeded { last, .. } => last,
            RetryError::Terminal(e) => e,
        }
    }
}

fn is_retryable<E: VendorFault>(err: &E, extra: &[&str]) -> bool {
    if classify(err) == ErrorClass::TransientService {
        return true;
    }
    // per-operation extras sit outside the global classification
    err.vendor_code()
        .is_some_and(|code| code_is_retryable(code, extra))
}

/// Run `op` until it succeeds, the policy deadline passes, or it fails with
/// a non-retryable error. Sleeps between attempts with an exponentially
/// growing, jittered delay.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<T, RetryError<E>>
where
    E: VendorFault + Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let started = Instant::now();
    let mut delay = policy.initial_delay;
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if !is_retryable(&err, policy.extra_retryable) => {
                tracing::error!(%err, attempt, "non-retryable error");
                return Err(RetryError::Terminal(err));
            }
            Err(err) => {
                let elapsed = started.elapsed();
                if elapsed + delay >= policy.timeout {
                    return Err(RetryError::DeadlineExceeded { elapsed, last: err });
                }
                let jittered = jitter(delay);
                tracing::warn!(%err, attempt, delay_ms = jittered.as_millis() as u64, "retrying");
                tokio::time::sleep(jittered).await;
                delay = Duration::from_secs_f64(
                    (delay.as_secs_f64() * policy.backoff_multiplier)
                        .min(policy.max_delay.as_secs_f64()),
                );
            }
        }
    }
}

/// Uniform jitter in [delay/2, delay].
fn jitter(delay: Duration) -> Duration {
    let base = delay.as_secs_f64();
    let factor = rand::thread_rng().gen_range(0.5..=1.0);
    Duration::from_secs_f64(base * factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestErr {
        code: &'static str,
        network: bool,
    }

    impl fmt::Display for TestErr {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.code)
        }
    }

    impl VendorFault for TestErr {
        fn vendor_code(&self) -> Option<&str> {
            (!self.network).then_some(self.code)
        }
        fn is_network(&self) -> bool {
            self.network
        }
    }

    fn policy() -> RetryPolicy {
        let mut p = RetryPolicy::new(Duration::from_secs(5));
        p.initial_delay = Duration::from_millis(1);
        p.max_delay = Duration::from_millis(2);
        p
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = retry(&policy(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(TestErr {
                        code: "SERVICE_TEMPORARY_UNAVAILABLE",
                        network: false,
                    })
                } else {
                    Ok(42u32)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn terminal_error_aborts_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry(&policy(), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(TestErr {
                    code: "INVALID_PARAMETER_VALUE",
                    network: false,
                })
            }
        })
        .await;
        assert!(matches!(result, Err(RetryError::Terminal(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn network_errors_are_retried() {
        let calls = AtomicU32::new(0);
        let result = retry(&policy(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(TestErr {
                        code: "",
                        network: true,
                    })
                } else {
                    Ok(())
                }
            }
        })
        .await;
        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn deadline_carries_last_error() {
        let mut p = policy();
        p.timeout = Duration::from_millis(5);
        let result: Result<(), _> = retry(&p, || async {
            Err(TestErr {
                code: "REQUEST_TIMED_OUT",
                network: false,
            })
        })
        .await;
        match result {
            Err(RetryError::DeadlineExceeded { last, .. }) => {
                assert_eq!(last.code, "REQUEST_TIMED_OUT")
            }
            other => panic!("expected deadline error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn dotted_sub_family_is_retryable() {
        let calls = AtomicU32::new(0);
        let result = retry(&policy(), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(TestErr {
                        code: "INTERNAL_SERVER_ERROR.Database",
                        network: false,
                    })
                } else {
                    Ok(())
                }
            }
        })
        .await;
        assert!(result.is_ok());
    }
}
