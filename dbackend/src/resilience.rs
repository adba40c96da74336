//! Bounded retry/backoff policy and backend operation hook contracts.

use std::future::Future;
use std::time::Duration;

use crate::{BackendError, BackendId};

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_secs(8),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    pub fn should_retry(&self, attempt: u32, error: &BackendError) -> bool {
        error.retryable && attempt < self.max_attempts
    }

    pub fn backoff_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = (attempt.saturating_sub(1)) as i32;
        let unbounded = self.initial_backoff.as_secs_f64() * self.backoff_multiplier.powi(exponent);
        Duration::from_secs_f64(unbounded.min(self.max_backoff.as_secs_f64()))
    }

    /// Backoff for `attempt`, raised to a server-provided `Retry-After` but never past the cap.
    pub fn delay_for(&self, attempt: u32, error: &BackendError) -> Duration {
        let backoff = self.backoff_for_attempt(attempt);
        match error.retry_after {
            Some(hint) => hint.max(backoff).min(self.max_backoff),
            None => backoff,
        }
    }
}

pub trait BackendOperationHooks: Send + Sync {
    fn on_attempt_start(&self, _backend: BackendId, _operation: &str, _attempt: u32) {}

    fn on_retry_scheduled(
        &self,
        _backend: BackendId,
        _operation: &str,
        _attempt: u32,
        _delay: Duration,
        _error: &BackendError,
    ) {
    }

    fn on_success(&self, _backend: BackendId, _operation: &str, _attempts: u32) {}

    fn on_failure(
        &self,
        _backend: BackendId,
        _operation: &str,
        _attempts: u32,
        _error: &BackendError,
    ) {
    }

    fn on_fallback(&self, _from: BackendId, _to: BackendId, _error: &BackendError) {}
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopOperationHooks;

impl BackendOperationHooks for NoopOperationHooks {}

pub async fn execute_with_retry<T, Op, OpFuture, Sleep, SleepFuture>(
    backend: BackendId,
    operation: &str,
    policy: &RetryPolicy,
    hooks: &dyn BackendOperationHooks,
    mut execute: Op,
    mut sleep: Sleep,
) -> Result<T, BackendError>
where
    Op: FnMut(u32) -> OpFuture,
    OpFuture: Future<Output = Result<T, BackendError>>,
    Sleep: FnMut(Duration) -> SleepFuture,
    SleepFuture: Future<Output = ()>,
{
    let mut attempt = 1;

    loop {
        hooks.on_attempt_start(backend, operation, attempt);

        match execute(attempt).await {
            Ok(value) => {
                hooks.on_success(backend, operation, attempt);
                return Ok(value);
            }
            Err(error) => {
                if policy.should_retry(attempt, &error) {
                    let delay = policy.delay_for(attempt, &error);
                    hooks.on_retry_scheduled(backend, operation, attempt, delay, &error);
                    sleep(delay).await;
                    attempt += 1;
                    continue;
                }

                hooks.on_failure(backend, operation, attempt, &error);
                return Err(error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::BackendErrorKind;

    #[test]
    fn only_rate_limits_are_retried_within_the_ceiling() {
        let policy = RetryPolicy::new(3);
        let limited = BackendError::rate_limited("429");

        assert!(policy.should_retry(1, &limited));
        assert!(policy.should_retry(2, &limited));
        assert!(!policy.should_retry(3, &limited));
        assert!(!policy.should_retry(1, &BackendError::unavailable("down")));
        assert!(!policy.should_retry(1, &BackendError::protocol("garbled")));
    }

    #[test]
    fn backoff_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_millis(250),
            backoff_multiplier: 2.0,
        };

        assert_eq!(policy.backoff_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.backoff_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.backoff_for_attempt(3), Duration::from_millis(250));
    }

    #[test]
    fn retry_after_raises_delay_up_to_cap() {
        let policy = RetryPolicy {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(2),
            backoff_multiplier: 2.0,
        };

        let hinted = BackendError::rate_limited("429").with_retry_after(Duration::from_secs(1));
        assert_eq!(policy.delay_for(1, &hinted), Duration::from_secs(1));

        let excessive = BackendError::rate_limited("429").with_retry_after(Duration::from_secs(60));
        assert_eq!(policy.delay_for(1, &excessive), Duration::from_secs(2));

        let plain = BackendError::rate_limited("429");
        assert_eq!(policy.delay_for(2, &plain), Duration::from_millis(200));
    }

    #[derive(Default)]
    struct RecordingHooks {
        events: Mutex<Vec<String>>,
    }

    impl BackendOperationHooks for RecordingHooks {
        fn on_attempt_start(&self, backend: BackendId, operation: &str, attempt: u32) {
            self.events
                .lock()
                .expect("events lock")
                .push(format!("start:{backend}:{operation}:{attempt}"));
        }

        fn on_retry_scheduled(
            &self,
            backend: BackendId,
            operation: &str,
            attempt: u32,
            _delay: Duration,
            _error: &BackendError,
        ) {
            self.events
                .lock()
                .expect("events lock")
                .push(format!("retry:{backend}:{operation}:{attempt}"));
        }

        fn on_success(&self, backend: BackendId, operation: &str, attempts: u32) {
            self.events
                .lock()
                .expect("events lock")
                .push(format!("success:{backend}:{operation}:{attempts}"));
        }

        fn on_failure(
            &self,
            backend: BackendId,
            operation: &str,
            attempts: u32,
            error: &BackendError,
        ) {
            self.events
                .lock()
                .expect("events lock")
                .push(format!("failure:{backend}:{operation}:{attempts}:{:?}", error.kind));
        }
    }

    #[tokio::test]
    async fn rate_limited_attempts_back_off_then_succeed() {
        let policy = RetryPolicy::new(3);
        let hooks = RecordingHooks::default();
        let sleeps = Arc::new(Mutex::new(Vec::new()));

        let result = execute_with_retry(
            BackendId::CloudflareWorkersAi,
            "invoke",
            &policy,
            &hooks,
            |attempt| async move {
                if attempt < 3 {
                    Err(BackendError::rate_limited("slow down"))
                } else {
                    Ok(attempt)
                }
            },
            {
                let sleeps = Arc::clone(&sleeps);
                move |delay| {
                    let sleeps = Arc::clone(&sleeps);
                    async move {
                        sleeps.lock().expect("sleep lock").push(delay);
                    }
                }
            },
        )
        .await;

        assert_eq!(result.expect("third attempt succeeds"), 3);
        assert_eq!(
            *sleeps.lock().expect("sleep lock"),
            vec![Duration::from_millis(500), Duration::from_secs(1)]
        );

        let events = hooks.events.lock().expect("events lock").clone();
        assert!(events.contains(&"retry:cloudflare:invoke:2".to_string()));
        assert!(events.contains(&"success:cloudflare:invoke:3".to_string()));
    }

    #[tokio::test]
    async fn unavailable_fails_after_one_attempt() {
        let policy = RetryPolicy::new(5);
        let hooks = RecordingHooks::default();

        let error = execute_with_retry::<(), _, _, _, _>(
            BackendId::Ollama,
            "invoke",
            &policy,
            &hooks,
            |_| async move { Err(BackendError::unavailable("connection refused")) },
            |_| async move {},
        )
        .await
        .expect_err("unavailable is not retried");

        assert_eq!(error.kind, BackendErrorKind::Unavailable);
        let events = hooks.events.lock().expect("events lock").clone();
        assert_eq!(
            events,
            vec![
                "start:ollama:invoke:1".to_string(),
                "failure:ollama:invoke:1:Unavailable".to_string()
            ]
        );
    }
}
