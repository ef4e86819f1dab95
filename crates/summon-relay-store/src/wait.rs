//! Bounded polling for artifacts produced outside this process
//!
//! The desktop agent writes results and creature files on its own schedule.
//! Waiting for them is a fixed interval times a fixed number of attempts;
//! once the bound is reached the wait reports a timeout and nothing keeps
//! polling in the background. Dropping the future cancels the wait.

use serde::{Deserialize, Serialize};
use std::future::Future;
use summon_relay_core::{RelayError, Result};
use tokio::time::{Duration, sleep};
use tracing::debug;

/// Interval and attempt bound for a poll loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PollWindow {
    pub interval_ms: u64,
    pub max_attempts: u32,
}

impl PollWindow {
    pub const fn new(interval_ms: u64, max_attempts: u32) -> Self {
        Self {
            interval_ms,
            max_attempts,
        }
    }

    /// Front-end poll for a queued result: 1s x 30
    pub const fn result() -> Self {
        Self::new(1_000, 30)
    }

    /// Creature generation wait: 5s x 60 (five minutes)
    pub const fn summon() -> Self {
        Self::new(5_000, 60)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.interval_ms)
    }

    /// Upper bound on time spent sleeping
    pub fn budget(&self) -> Duration {
        self.interval() * self.max_attempts.saturating_sub(1)
    }
}

impl Default for PollWindow {
    fn default() -> Self {
        Self::result()
    }
}

/// Call `probe` until it yields a value or the window is exhausted
pub async fn poll_until<T, F, Fut>(window: PollWindow, what: &str, mut probe: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Option<T>>>,
{
    for attempt in 1..=window.max_attempts {
        if let Some(value) = probe().await? {
            debug!("{} ready after {} attempt(s)", what, attempt);
            return Ok(value);
        }
        if attempt < window.max_attempts {
            sleep(window.interval()).await;
        }
    }

    Err(RelayError::Timeout(format!(
        "{} not available after {} attempts at {}ms",
        what, window.max_attempts, window.interval_ms
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result: Result<()> = poll_until(PollWindow::new(1, 4), "result", || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(None)
            }
        })
        .await;

        assert!(matches!(result, Err(RelayError::Timeout(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_returns_first_value() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let value = poll_until(PollWindow::new(1, 10), "result", || {
            let counter = counter.clone();
            async move {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                Ok((n == 3).then_some(n))
            }
        })
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_probe_error_stops_polling() {
        let result: Result<u32> = poll_until(PollWindow::new(1, 10), "result", || async {
            Err(RelayError::Storage("disk gone".into()))
        })
        .await;
        assert!(matches!(result, Err(RelayError::Storage(_))));
    }

    #[test]
    fn test_presets() {
        assert_eq!(PollWindow::result().interval(), Duration::from_secs(1));
        assert_eq!(PollWindow::result().max_attempts, 30);
        assert_eq!(PollWindow::summon().budget(), Duration::from_secs(295));
    }
}
