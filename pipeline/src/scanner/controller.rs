use frame_scan_common::frame::Frame;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info, warn};

use super::session::{ScanSession, ScanStats};
use crate::events::ScanListener;
use crate::source::{FrameSink, FrameSource, SourceEvent};
use crate::worker::{DecodeOutcome, DecodeWorker};

/// Event loop run on the caller's task for one scanning session.
///
/// Owns the session record exclusively; the decode thread only ever sees
/// frames and hands back [`DecodeOutcome`]s.
pub(crate) struct ScanController<S, L> {
    session: ScanSession,
    worker: DecodeWorker,
    source: S,
    listener: L,
    sink: FrameSink,
    frames: mpsc::UnboundedReceiver<SourceEvent>,
    results: mpsc::UnboundedReceiver<DecodeOutcome>,
    /// A frame request is outstanding at the source.
    armed: bool,
    rearm_at: Option<Instant>,
}

impl<S: FrameSource, L: ScanListener> ScanController<S, L> {
    pub(crate) fn new(
        session: ScanSession,
        worker: DecodeWorker,
        results: mpsc::UnboundedReceiver<DecodeOutcome>,
        source: S,
        listener: L,
    ) -> Self {
        let (tx, frames) = mpsc::unbounded_channel();
        Self {
            session,
            worker,
            source,
            listener,
            sink: FrameSink::new(tx),
            frames,
            results,
            armed: false,
            rearm_at: None,
        }
    }

    pub(crate) async fn run(mut self, mut stop: oneshot::Receiver<()>) -> ScanStats {
        self.arm();

        loop {
            let rearm_at = self.rearm_at;
            tokio::select! {
                _ = &mut stop => break,
                Some(event) = self.frames.recv() => self.on_source_event(event),
                Some(outcome) = self.results.recv() => self.on_decode_result(outcome),
                _ = rearm_timer(rearm_at) => {
                    self.rearm_at = None;
                    self.arm();
                }
            }
        }

        self.finish()
    }

    fn on_source_event(&mut self, event: SourceEvent) {
        self.armed = false;
        match event {
            SourceEvent::Frame(frame) => self.on_frame(frame),
            SourceEvent::Failed(error) => {
                // Recovery belongs to whoever owns the device.
                self.session.note_capture_error();
                warn!(error = %error, "capture layer failed, not retrying");
                self.listener.on_error(&error);
            }
        }
    }

    fn on_frame(&mut self, frame: Frame) {
        let seq = frame.seq();
        let admitted = self.session.admit(Instant::now());

        let stats = self.session.stats();
        if stats.frames_offered % 100 == 0 {
            debug!(
                offered = stats.frames_offered,
                submitted = stats.frames_submitted,
                reported = stats.payloads_reported,
                "frames processed"
            );
        }

        if !admitted {
            self.arm();
            return;
        }
        if !self.worker.submit(frame) {
            self.session.note_dropped();
            self.arm();
            return;
        }
        debug!(seq, "frame submitted for decoding");
    }

    fn on_decode_result(&mut self, outcome: DecodeOutcome) {
        let now = Instant::now();
        debug!(
            seq = outcome.seq,
            elapsed_ms = outcome.elapsed.as_millis() as u64,
            found = outcome.payload.is_some(),
            "decode finished"
        );

        if let Some(payload) = outcome.payload.as_deref() {
            if self.session.review(Some(payload), now) {
                info!(seq = outcome.seq, payload, "code scanned");
                self.listener.on_payload_scanned(payload);
            }
        } else {
            self.session.review(None, now);
        }

        // Pace the next capture to the throttle window.
        self.rearm_at = Some(now + self.session.throttle_interval());
    }

    fn arm(&mut self) {
        if self.armed {
            return;
        }
        self.armed = true;
        self.source.request_next_frame(self.sink.clone());
    }

    fn finish(mut self) -> ScanStats {
        self.worker.shutdown();
        self.source.detach();
        let stats = self.session.stats();
        info!(
            offered = stats.frames_offered,
            submitted = stats.frames_submitted,
            decoded = stats.payloads_decoded,
            reported = stats.payloads_reported,
            capture_errors = stats.capture_errors,
            "scanner stopped"
        );
        stats
    }
}

async fn rearm_timer(at: Option<Instant>) {
    match at {
        Some(at) => sleep_until(at).await,
        None => std::future::pending().await,
    }
}
