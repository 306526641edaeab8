use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::ProgressSink;

pub const TICK_START: u8 = 10;
pub const TICK_STEP: u8 = 5;
pub const TICK_CEILING: u8 = 90;

/// Simulated progress for a stage waiting on a model call.
///
/// Reports [`TICK_START`] immediately, then adds [`TICK_STEP`] every interval
/// up to [`TICK_CEILING`]. The task stops when the ticker is stopped or dropped.
pub struct ProgressTicker {
    token: CancellationToken,
}

impl ProgressTicker {
    /// Must be called from inside a tokio runtime.
    pub fn start(
        sink: Arc<dyn ProgressSink>,
        stage_id: impl Into<String>,
        interval: Duration,
        message: impl Into<String>,
    ) -> Self {
        let token = CancellationToken::new();
        let child = token.child_token();
        let stage_id = stage_id.into();
        let message = message.into();
        sink.stage_progress(&stage_id, TICK_START, Some(message.clone()));

        tokio::spawn(async move {
            let mut percent = TICK_START;
            while percent < TICK_CEILING {
                tokio::select! {
                    biased;
                    _ = child.cancelled() => return,
                    _ = tokio::time::sleep(interval) => {}
                }
                percent = percent.saturating_add(TICK_STEP).min(TICK_CEILING);
                sink.stage_progress(&stage_id, percent, Some(message.clone()));
            }
        });

        Self { token }
    }

    pub fn stop(self) {
        self.token.cancel();
    }
}

impl Drop for ProgressTicker {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<u8>>);

    impl ProgressSink for Recorder {
        fn stage_progress(&self, _stage_id: &str, percent: u8, _message: Option<String>) {
            self.0.lock().unwrap().push(percent);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_climb_to_ceiling() {
        let recorder = Arc::new(Recorder::default());
        let ticker = ProgressTicker::start(recorder.clone(), "process", Duration::from_secs(1), "working");
        tokio::time::sleep(Duration::from_secs(30)).await;
        drop(ticker);

        let ticks = recorder.0.lock().unwrap().clone();
        assert_eq!(ticks.first(), Some(&TICK_START));
        assert_eq!(ticks.last(), Some(&TICK_CEILING));
        assert_eq!(ticks.len(), 17);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_stops_ticks() {
        let recorder = Arc::new(Recorder::default());
        let ticker = ProgressTicker::start(recorder.clone(), "process", Duration::from_secs(1), "working");
        tokio::time::sleep(Duration::from_millis(2_500)).await;
        drop(ticker);
        tokio::time::sleep(Duration::from_secs(10)).await;

        assert_eq!(*recorder.0.lock().unwrap(), vec![10, 15, 20]);
    }

    #[tokio::test]
    async fn no_tick_after_stop_even_when_due() {
        let recorder = Arc::new(Recorder::default());
        let ticker = ProgressTicker::start(recorder.clone(), "process", Duration::ZERO, "working");
        ticker.stop();
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }

        assert_eq!(*recorder.0.lock().unwrap(), vec![TICK_START]);
    }
}
