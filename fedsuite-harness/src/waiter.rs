//! Polling with a deadline, the one synchronisation primitive of the suite
//!
//! Cross-instance state converges asynchronously, so every remote
//! observation goes through [`ConvergenceWaiter::wait_until`]: the producer
//! performs a live fetch, the predicate inspects it, and polling continues
//! until the predicate holds or the budget is spent.

use fedsuite_core::{Error, Result, SuiteConfig};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep_until, timeout_at, Instant};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergenceWaiter {
    poll_interval: Duration,
    timeout: Duration,
}

impl ConvergenceWaiter {
    pub fn new(poll_interval: Duration, timeout: Duration) -> Self {
        Self {
            poll_interval,
            timeout,
        }
    }

    /// Budget for one hop between two instances.
    pub fn propagation(config: &SuiteConfig) -> Self {
        Self::new(config.poll_interval(), config.propagation_timeout())
    }

    /// Budget for an activity relayed through a third instance.
    pub fn relay(config: &SuiteConfig) -> Self {
        Self::new(config.poll_interval(), config.relay_timeout())
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self { timeout, ..self }
    }

    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll `producer` until `predicate` holds for its output.
    ///
    /// Returns the last producer output. Producer errors count as "not yet"
    /// and the most recent one is reported in the timeout error, except a
    /// `StateTransition` error, which ends the wait at once. Poll starts
    /// are at least `poll_interval` apart, and a producer call still running
    /// one interval past the deadline is abandoned, so a wait never overruns
    /// `timeout` by more than one interval.
    pub async fn wait_until<T, F, Fut, P>(
        &self,
        description: &str,
        mut producer: F,
        predicate: P,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&T) -> bool,
    {
        debug!(
            description,
            timeout = ?self.timeout,
            interval = ?self.poll_interval,
            "Waiting for convergence"
        );

        let start = Instant::now();
        let deadline = start + self.timeout;
        let hard_stop = deadline + self.poll_interval;
        let mut attempts: u32 = 0;
        let mut last_error: Option<String> = None;

        loop {
            attempts += 1;
            let poll_start = Instant::now();
            let outcome = match timeout_at(hard_stop, producer()).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    warn!(description, attempts, "Producer still running past the deadline");
                    return Err(Error::timeout(
                        description,
                        self.timeout.as_millis() as u64,
                        attempts,
                        Some("producer still running past the deadline".to_string()),
                    ));
                }
            };
            match outcome {
                Ok(value) if predicate(&value) => {
                    debug!(
                        description,
                        attempts,
                        elapsed = ?start.elapsed(),
                        "Converged"
                    );
                    return Ok(value);
                }
                Ok(_) => {
                    debug!(description, attempt = attempts, "Not converged yet");
                }
                Err(e @ Error::StateTransition { .. }) => {
                    warn!(description, attempts, error = %e, "Observed an impossible state");
                    return Err(e);
                }
                Err(e) => {
                    debug!(description, attempt = attempts, error = %e, "Producer failed");
                    last_error = Some(e.to_string());
                }
            }

            if Instant::now() >= deadline {
                warn!(
                    description,
                    attempts,
                    timeout = ?self.timeout,
                    last_error = last_error.as_deref().unwrap_or("none"),
                    "Timed out waiting for convergence"
                );
                return Err(Error::timeout(
                    description,
                    self.timeout.as_millis() as u64,
                    attempts,
                    last_error,
                ));
            }

            sleep_until(poll_start + self.poll_interval).await;
        }
    }

    /// Wait until the producer yields a value satisfying `predicate`.
    pub async fn wait_for_some<T, F, Fut, P>(
        &self,
        description: &str,
        producer: F,
        predicate: P,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
        P: Fn(&T) -> bool,
    {
        self.wait_until(description, producer, |found: &Option<T>| {
            found.as_ref().is_some_and(&predicate)
        })
        .await?
        .ok_or_else(|| Error::Internal(format!("{} converged without a value", description)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::time::sleep;

    fn waiter() -> ConvergenceWaiter {
        ConvergenceWaiter::new(Duration::from_millis(500), Duration::from_secs(10))
    }

    #[tokio::test(start_paused = true)]
    async fn test_returns_first_satisfying_value() {
        let calls = Arc::new(Mutex::new(0u32));
        let value = waiter()
            .wait_until(
                "counter reaches three",
                || {
                    let calls = calls.clone();
                    async move {
                        let mut calls = calls.lock().unwrap();
                        *calls += 1;
                        Ok(*calls)
                    }
                },
                |n| *n >= 3,
            )
            .await
            .unwrap();
        assert_eq!(value, 3);
        assert_eq!(*calls.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_are_spaced_by_interval() {
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let _ = waiter()
            .with_timeout(Duration::from_secs(3))
            .wait_until(
                "never",
                || {
                    let stamps = stamps.clone();
                    async move {
                        stamps.lock().unwrap().push(Instant::now());
                        Ok(false)
                    }
                },
                |ok| *ok,
            )
            .await;

        let stamps = stamps.lock().unwrap();
        assert!(stamps.len() > 1);
        for pair in stamps.windows(2) {
            assert!(pair[1] - pair[0] >= Duration::from_millis(500));
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_attempts() {
        let start = Instant::now();
        let err = waiter()
            .wait_until("never", || async { Ok(0) }, |n: &i32| *n > 0)
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        match err {
            Error::Timeout {
                attempts,
                timeout_ms,
                last_error,
                ..
            } => {
                assert_eq!(attempts, 21);
                assert_eq!(timeout_ms, 10_000);
                assert!(last_error.is_none());
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(start.elapsed() <= Duration::from_millis(10_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_producer_overrun_is_bounded() {
        let start = Instant::now();
        let producer_cost = Duration::from_millis(300);
        let err = ConvergenceWaiter::new(Duration::from_millis(500), Duration::from_secs(2))
            .wait_until(
                "slow",
                || async move {
                    sleep(producer_cost).await;
                    Ok(false)
                },
                |ok| *ok,
            )
            .await
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() <= Duration::from_secs(2) + Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_producer_slower_than_interval_is_cut_at_one_interval() {
        let start = Instant::now();
        let stamps = Arc::new(Mutex::new(Vec::new()));
        let err = ConvergenceWaiter::new(Duration::from_millis(500), Duration::from_secs(3))
            .wait_until(
                "very slow",
                || {
                    let stamps = stamps.clone();
                    async move {
                        stamps.lock().unwrap().push(Instant::now());
                        sleep(Duration::from_secs(2)).await;
                        Ok(false)
                    }
                },
                |ok| *ok,
            )
            .await
            .unwrap_err();

        match err {
            Error::Timeout { attempts, last_error, .. } => {
                assert_eq!(attempts, 2);
                assert!(last_error.unwrap().contains("past the deadline"));
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert!(start.elapsed() <= Duration::from_millis(3_500));
        let stamps = stamps.lock().unwrap();
        assert!(stamps[1] - stamps[0] >= Duration::from_millis(500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_producer_errors_are_retried_and_reported() {
        let calls = Arc::new(Mutex::new(0u32));
        let value = waiter()
            .wait_until(
                "flaky",
                || {
                    let calls = calls.clone();
                    async move {
                        let mut calls = calls.lock().unwrap();
                        *calls += 1;
                        if *calls < 3 {
                            Err(Error::Transport("connection reset".into()))
                        } else {
                            Ok("ready")
                        }
                    }
                },
                |_| true,
            )
            .await
            .unwrap();
        assert_eq!(value, "ready");

        let err = waiter()
            .with_timeout(Duration::from_secs(1))
            .wait_until(
                "always failing",
                || async { Err::<(), _>(Error::Transport("connection refused".into())) },
                |_| true,
            )
            .await
            .unwrap_err();
        match err {
            Error::Timeout { last_error, .. } => {
                assert!(last_error.unwrap().contains("connection refused"));
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_state_transition_error_stops_polling() {
        let calls = Arc::new(Mutex::new(0u32));
        let start = Instant::now();
        let err = waiter()
            .wait_until(
                "follow settles",
                || {
                    let calls = calls.clone();
                    async move {
                        let mut calls = calls.lock().unwrap();
                        *calls += 1;
                        if *calls == 2 {
                            Err(Error::state_transition("Subscribed to ApprovalRequired"))
                        } else {
                            Ok(false)
                        }
                    }
                },
                |ok| *ok,
            )
            .await
            .unwrap_err();

        assert_eq!(err.category(), "state_transition");
        assert_eq!(*calls.lock().unwrap(), 2);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_some_unwraps() {
        let calls = Arc::new(Mutex::new(0u32));
        let found = waiter()
            .wait_for_some(
                "appears",
                || {
                    let calls = calls.clone();
                    async move {
                        let mut calls = calls.lock().unwrap();
                        *calls += 1;
                        Ok((*calls >= 2).then_some(*calls * 10))
                    }
                },
                |v| *v >= 20,
            )
            .await
            .unwrap();
        assert_eq!(found, 20);
    }
}
