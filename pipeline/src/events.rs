use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::source::CaptureError;

/// Consumer of scan results. Called on the scanner's controller task, never
/// on the decode thread.
pub trait ScanListener: Send {
    fn on_payload_scanned(&mut self, payload: &str);

    fn on_error(&mut self, _error: &CaptureError) {}
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Scanned { payload: String, at: Instant },
    CaptureFailed(CaptureError),
}

/// Forward events into a channel; a dropped receiver just discards them.
impl ScanListener for mpsc::UnboundedSender<ScanEvent> {
    fn on_payload_scanned(&mut self, payload: &str) {
        let _ = self.send(ScanEvent::Scanned {
            payload: payload.to_owned(),
            at: Instant::now(),
        });
    }

    fn on_error(&mut self, error: &CaptureError) {
        let _ = self.send(ScanEvent::CaptureFailed(error.clone()));
    }
}
