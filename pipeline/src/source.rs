use bytes::Bytes;
use frame_scan_common::frame::{Frame, FrameError};
use tokio::sync::mpsc;
use tracing::debug;

/// Capture layer feeding the scanner.
///
/// The scanner pulls: every call to [`FrameSource::request_next_frame`] arms
/// delivery of exactly one frame (or one failure) through the given sink.
/// Implementations must not block; deliver later from a callback, a thread
/// or a task. A sink may be kept and used again once the device recovers.
pub trait FrameSource: Send {
    fn request_next_frame(&mut self, sink: FrameSink);

    /// Called once when the scanner stops.
    fn detach(&mut self) {}
}

#[derive(Debug)]
pub(crate) enum SourceEvent {
    Frame(Frame),
    Failed(CaptureError),
}

/// Handle through which a [`FrameSource`] hands frames to the scanner.
/// Everything sent after the scanner stopped is discarded.
#[derive(Debug, Clone)]
pub struct FrameSink {
    tx: mpsc::UnboundedSender<SourceEvent>,
}

impl FrameSink {
    pub(crate) fn new(tx: mpsc::UnboundedSender<SourceEvent>) -> Self {
        Self { tx }
    }

    pub fn deliver(&self, frame: Frame) {
        let seq = frame.seq();
        if self.tx.send(SourceEvent::Frame(frame)).is_err() {
            debug!(seq, "scanner stopped, discarding frame");
        }
    }

    /// Build a frame from a raw buffer (luma plane first) and deliver it.
    pub fn deliver_raw(
        &self,
        data: impl Into<Bytes>,
        width: u32,
        height: u32,
        seq: u64,
    ) -> Result<(), FrameError> {
        self.deliver(Frame::new(data, width, height, seq)?);
        Ok(())
    }

    /// Report that the capture layer cannot supply frames.
    pub fn fail(&self, error: CaptureError) {
        if self.tx.send(SourceEvent::Failed(error)).is_err() {
            debug!("scanner stopped, discarding capture error");
        }
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CaptureError {
    #[error("capture unavailable: {reason}")]
    Unavailable { reason: String, code: Option<i32> },
    #[error("frame source disconnected")]
    Disconnected,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deliver_raw_validates_frame() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let sink = FrameSink::new(tx);

        assert!(sink.deliver_raw(vec![0u8; 3], 2, 2, 0).is_err());
        sink.deliver_raw(vec![0u8; 4], 2, 2, 9).unwrap();

        match rx.try_recv().unwrap() {
            SourceEvent::Frame(frame) => assert_eq!(frame.seq(), 9),
            other => panic!("unexpected event {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn sending_after_close_is_silent() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = FrameSink::new(tx);
        drop(rx);

        assert!(sink.is_closed());
        sink.fail(CaptureError::Disconnected);
        sink.deliver_raw(vec![0u8; 1], 1, 1, 0).unwrap();
    }
}
