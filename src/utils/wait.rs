//! Polling pacing for condition waits
//!
//! Every "wait for X" step in the engine is a timed poll loop against page
//! state, because the chat application renders asynchronously and offers no
//! deterministic callbacks. The pacing starts fast to catch quick renders and
//! backs off exponentially so long waits don't hammer the protocol channel.

use std::time::{Duration, Instant};

/// Exponential backoff pacing for a poll loop.
///
/// Starts at 100ms, doubles each step, caps at 1 second.
#[derive(Debug)]
pub struct PollPacing {
    interval: Duration,
    max_interval: Duration,
    started: Instant,
    deadline: Duration,
}

impl PollPacing {
    pub fn new(deadline: Duration) -> Self {
        Self {
            interval: Duration::from_millis(100),
            max_interval: Duration::from_secs(1),
            started: Instant::now(),
            deadline,
        }
    }

    /// Whether the overall deadline has elapsed.
    pub fn expired(&self) -> bool {
        self.started.elapsed() >= self.deadline
    }

    /// Milliseconds waited so far, for error reporting.
    pub fn waited_ms(&self) -> u64 {
        self.started.elapsed().as_millis() as u64
    }

    /// Sleep for the current interval, then double it (capped).
    pub async fn pause(&mut self) {
        tokio::time::sleep(self.interval).await;
        self.interval = (self.interval * 2).min(self.max_interval);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn interval_doubles_and_caps() {
        let mut pacing = PollPacing::new(Duration::from_secs(60));
        assert_eq!(pacing.interval, Duration::from_millis(100));
        tokio::time::pause();
        for _ in 0..6 {
            pacing.pause().await;
        }
        assert_eq!(pacing.interval, Duration::from_secs(1));
    }

    #[tokio::test]
    async fn deadline_expiry() {
        let pacing = PollPacing::new(Duration::from_millis(0));
        assert!(pacing.expired());
        let pacing = PollPacing::new(Duration::from_secs(30));
        assert!(!pacing.expired());
    }
}
