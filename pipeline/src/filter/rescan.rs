use std::time::Duration;
use tokio::time::Instant;

/// Scan state owned by the controller for one scanning session.
#[derive(Debug, Clone, Default)]
pub struct ScanRecord {
    /// Most recently *reported* payload.
    pub last_payload: Option<String>,
    pub last_reported_at: Option<Instant>,
    /// When the last frame was handed to the worker.
    pub last_submitted_at: Option<Instant>,
}

impl ScanRecord {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Never moves `last_submitted_at` backwards.
    pub fn note_submitted(&mut self, now: Instant) {
        self.last_submitted_at = Some(match self.last_submitted_at {
            Some(prev) if prev > now => prev,
            _ => now,
        });
    }

    pub fn note_reported(&mut self, payload: &str, now: Instant) {
        self.last_payload = Some(payload.to_owned());
        self.last_reported_at = Some(now);
    }
}

/// Decide whether a freshly decoded payload should reach the consumer.
///
/// A new or different payload (case-insensitive) is always reported. The
/// same payload is reported again only once `window` has elapsed since it
/// was last *reported*; suppressed sightings do not extend the window.
pub fn should_report(payload: &str, record: &ScanRecord, now: Instant, window: Duration) -> bool {
    let Some(last) = record.last_payload.as_deref().filter(|p| !p.is_empty()) else {
        return true;
    };
    if !same_code(last, payload) {
        return true;
    }
    match record.last_reported_at {
        Some(at) => now.saturating_duration_since(at) > window,
        None => true,
    }
}

fn same_code(a: &str, b: &str) -> bool {
    a.chars()
        .flat_map(char::to_lowercase)
        .eq(b.chars().flat_map(char::to_lowercase))
}

#[derive(Debug, Clone, Copy)]
pub struct RescanGuard {
    window: Duration,
}

impl RescanGuard {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn should_report(&self, payload: &str, record: &ScanRecord, now: Instant) -> bool {
        should_report(payload, record, now, self.window)
    }
}
