use std::time::Duration;
use tokio::time::Instant;

/// `true` when more than `interval` has passed since the last submission.
/// Nothing submitted yet always passes.
pub fn should_submit(now: Instant, last_submitted: Option<Instant>, interval: Duration) -> bool {
    match last_submitted {
        None => true,
        Some(last) => now.saturating_duration_since(last) > interval,
    }
}

/// Submission-side gate that bounds decode CPU and keeps stale frames out
/// of the worker.
#[derive(Debug, Clone, Copy)]
pub struct FrameThrottle {
    interval: Duration,
}

impl FrameThrottle {
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn should_submit(&self, now: Instant, last_submitted: Option<Instant>) -> bool {
        should_submit(now, last_submitted, self.interval)
    }
}
