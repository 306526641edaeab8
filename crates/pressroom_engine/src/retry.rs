//! Retry-with-backoff and fallback wrappers around async operations.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use pressroom_logging::press_warn;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::UnboundedSender;

/// Error substrings treated as transient by [`RetryPolicy::transient_only`].
pub const TRANSIENT_MARKERS: &[&str] = &[
    "timeout",
    "rate limit",
    "server error",
    "network error",
    "gateway timeout",
    "timed out",
    "not valid json",
    "exceeded maximum time",
];

/// Case-insensitive check of an error message against [`TRANSIENT_MARKERS`].
pub fn is_transient_message(message: &str) -> bool {
    let lower = message.to_lowercase();
    TRANSIENT_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Emitted before each backoff wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryEvent {
    /// 1-based number of the retry about to happen.
    pub attempt: u32,
    pub delay: Duration,
    pub error: String,
}

type Condition<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Per-call-site retry settings. Backoff is linear: the wait before retry `n`
/// is `retry_delay * n`.
pub struct RetryPolicy<E> {
    pub max_retries: u32,
    pub retry_delay: Duration,
    condition: Condition<E>,
    observer: Option<UnboundedSender<RetryEvent>>,
}

impl<E> RetryPolicy<E> {
    /// Retries every failure until `max_retries` is reached.
    pub fn new(max_retries: u32, retry_delay: Duration) -> Self {
        Self {
            max_retries,
            retry_delay,
            condition: Arc::new(|_: &E| true),
            observer: None,
        }
    }

    pub fn retry_if(mut self, condition: impl Fn(&E) -> bool + Send + Sync + 'static) -> Self {
        self.condition = Arc::new(condition);
        self
    }

    pub fn notify(mut self, observer: UnboundedSender<RetryEvent>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn should_retry(&self, attempt: u32, error: &E) -> bool {
        attempt < self.max_retries && (self.condition)(error)
    }

    /// Wait before the retry that follows failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.retry_delay.saturating_mul(attempt.saturating_add(1))
    }
}

impl<E: fmt::Display> RetryPolicy<E> {
    pub fn transient_only(self) -> Self {
        self.retry_if(|error: &E| is_transient_message(&error.to_string()))
    }
}

impl<E> Default for RetryPolicy<E> {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_retries: self.max_retries,
            retry_delay: self.retry_delay,
            condition: Arc::clone(&self.condition),
            observer: self.observer.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .field("observed", &self.observer.is_some())
            .finish()
    }
}

/// Retry knobs as they appear in settings files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl RetrySettings {
    pub const fn new(max_retries: u32, retry_delay_ms: u64) -> Self {
        Self {
            max_retries,
            retry_delay_ms,
        }
    }

    pub fn policy<E>(&self) -> RetryPolicy<E> {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_delay_ms))
    }
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self::new(2, 2000)
    }
}

/// Runs `operation` up to `max_retries + 1` times and returns the last error
/// once the policy gives up.
pub async fn execute<T, E, F, Fut>(policy: &RetryPolicy<E>, mut operation: F) -> Result<T, E>
where
    E: fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0u32;
    loop {
        let error = match operation().await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };
        if !policy.should_retry(attempt, &error) {
            if attempt > 0 {
                press_warn!("giving up after {} attempt(s): {error}", attempt + 1);
            }
            return Err(error);
        }

        let delay = policy.delay_for(attempt);
        attempt += 1;
        press_warn!("retry #{attempt} in {}ms: {error}", delay.as_millis());
        if let Some(observer) = &policy.observer {
            let _ = observer.send(RetryEvent {
                attempt,
                delay,
                error: error.to_string(),
            });
        }
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }
}

/// Awaits `operation` and substitutes `fallback` on any error.
pub async fn execute_with_fallback<T, E, Fut>(fallback: T, operation: Fut) -> T
where
    E: fmt::Display,
    Fut: Future<Output = Result<T, E>>,
{
    match operation.await {
        Ok(value) => value,
        Err(error) => {
            press_warn!("operation failed, using fallback: {error}");
            fallback
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_markers_match_case_insensitively() {
        assert!(is_transient_message("Gateway Timeout from upstream"));
        assert!(is_transient_message("Request TIMED OUT"));
        assert!(is_transient_message("Function exceeded maximum time"));
        assert!(!is_transient_message("invalid api key"));
    }

    #[test]
    fn backoff_is_linear() {
        let policy: RetryPolicy<String> = RetryPolicy::new(3, Duration::from_millis(250));
        assert_eq!(policy.delay_for(0), Duration::from_millis(250));
        assert_eq!(policy.delay_for(2), Duration::from_millis(750));
        assert!(policy.should_retry(2, &"x".to_string()));
        assert!(!policy.should_retry(3, &"x".to_string()));
    }
}
