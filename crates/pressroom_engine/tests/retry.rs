use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use pressroom_engine::{execute, execute_with_fallback, RetryEvent, RetryPolicy};
use tokio::sync::mpsc;
use tokio::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Failure(&'static str);

impl std::fmt::Display for Failure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.0)
    }
}

fn failing(counter: &Arc<AtomicU32>, error: &'static str) -> impl FnMut() -> std::future::Ready<Result<u32, Failure>> {
    let counter = counter.clone();
    move || {
        counter.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Err(Failure(error)))
    }
}

#[tokio::test(start_paused = true)]
async fn exhausts_attempts_with_linear_waits() {
    let attempts = Arc::new(AtomicU32::new(0));
    let (tx, mut rx) = mpsc::unbounded_channel();
    let policy = RetryPolicy::new(3, Duration::from_millis(100)).notify(tx);

    let started = Instant::now();
    let result = execute(&policy, failing(&attempts, "server error")).await;

    assert_eq!(result, Err(Failure("server error")));
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
    assert_eq!(started.elapsed(), Duration::from_millis(600));

    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    assert_eq!(
        events,
        vec![
            RetryEvent {
                attempt: 1,
                delay: Duration::from_millis(100),
                error: "server error".into()
            },
            RetryEvent {
                attempt: 2,
                delay: Duration::from_millis(200),
                error: "server error".into()
            },
            RetryEvent {
                attempt: 3,
                delay: Duration::from_millis(300),
                error: "server error".into()
            },
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn rejected_condition_stops_after_first_attempt() {
    let attempts = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::new(5, Duration::from_secs(1)).retry_if(|_: &Failure| false);

    let started = Instant::now();
    let result = execute(&policy, failing(&attempts, "bad request")).await;

    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn transient_only_skips_fatal_errors() {
    let attempts = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::<Failure>::new(3, Duration::from_millis(10)).transient_only();
    let _ = execute(&policy, failing(&attempts, "invalid api key")).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 1);

    let attempts = Arc::new(AtomicU32::new(0));
    let _ = execute(&policy, failing(&attempts, "Rate limit reached")).await;
    assert_eq!(attempts.load(Ordering::SeqCst), 4);
}

#[tokio::test(start_paused = true)]
async fn zero_retries_means_one_attempt_without_wait() {
    let attempts = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::new(0, Duration::from_secs(60));

    let started = Instant::now();
    let result = execute(&policy, failing(&attempts, "timeout")).await;

    assert!(result.is_err());
    assert_eq!(attempts.load(Ordering::SeqCst), 1);
    assert_eq!(started.elapsed(), Duration::ZERO);
}

#[tokio::test(start_paused = true)]
async fn recovers_once_operation_succeeds() {
    let attempts = Arc::new(AtomicU32::new(0));
    let counter = attempts.clone();
    let policy = RetryPolicy::new(4, Duration::ZERO);

    let result = execute(&policy, move || {
        let n = counter.fetch_add(1, Ordering::SeqCst);
        async move {
            if n < 2 {
                Err(Failure("network error"))
            } else {
                Ok(n)
            }
        }
    })
    .await;

    assert_eq!(result, Ok(2));
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn fallback_replaces_exhausted_operation() {
    let attempts = Arc::new(AtomicU32::new(0));
    let policy = RetryPolicy::new(2, Duration::from_millis(5));

    let value = execute_with_fallback(7, execute(&policy, failing(&attempts, "timeout"))).await;

    assert_eq!(value, 7);
    assert_eq!(attempts.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn fallback_passes_success_through() {
    let value = execute_with_fallback(0, async { Ok::<_, Failure>(42) }).await;
    assert_eq!(value, 42);
}
