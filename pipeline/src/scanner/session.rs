use std::time::Duration;

use frame_scan_common::config::ScannerConfig;
use tokio::time::Instant;
use tracing::debug;

use crate::filter::{FrameThrottle, RescanGuard, ScanRecord};

/// Counters for one scanning session, returned by `Scanner::stop`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub frames_offered: u64,
    pub frames_throttled: u64,
    pub frames_submitted: u64,
    /// Passed the throttle but refused by a worker that was not running.
    pub frames_dropped: u64,
    pub decodes_completed: u64,
    pub payloads_decoded: u64,
    pub payloads_reported: u64,
    pub capture_errors: u64,
}

/// Synchronous core of the controller: throttle, rescan guard and the scan
/// record they share. Owned by the controller task only.
pub struct ScanSession {
    throttle: FrameThrottle,
    guard: RescanGuard,
    record: ScanRecord,
    stats: ScanStats,
}

impl ScanSession {
    pub fn new(config: &ScannerConfig) -> Self {
        Self {
            throttle: FrameThrottle::new(config.throttle_interval()),
            guard: RescanGuard::new(config.rescan_window()),
            record: ScanRecord::default(),
            stats: ScanStats::default(),
        }
    }

    /// Throttle check for an incoming frame. On `true` the submission time
    /// has been recorded and the frame should go to the worker.
    pub fn admit(&mut self, now: Instant) -> bool {
        self.stats.frames_offered += 1;
        if !self
            .throttle
            .should_submit(now, self.record.last_submitted_at)
        {
            self.stats.frames_throttled += 1;
            return false;
        }
        self.record.note_submitted(now);
        self.stats.frames_submitted += 1;
        true
    }

    pub fn note_dropped(&mut self) {
        self.stats.frames_dropped += 1;
    }

    pub fn note_capture_error(&mut self) {
        self.stats.capture_errors += 1;
    }

    /// Apply the rescan guard to a decode result. Returns `true` when the
    /// payload must be reported; the record is updated in that case only.
    pub fn review(&mut self, payload: Option<&str>, now: Instant) -> bool {
        self.stats.decodes_completed += 1;
        let Some(payload) = payload.filter(|p| !p.is_empty()) else {
            return false;
        };
        self.stats.payloads_decoded += 1;

        if !self.guard.should_report(payload, &self.record, now) {
            debug!(payload, "same code inside rescan window, suppressed");
            return false;
        }
        self.record.note_reported(payload, now);
        self.stats.payloads_reported += 1;
        true
    }

    pub fn throttle_interval(&self) -> Duration {
        self.throttle.interval()
    }

    pub fn record(&self) -> &ScanRecord {
        &self.record
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }
}
