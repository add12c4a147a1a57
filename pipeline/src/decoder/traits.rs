use frame_scan_common::frame::Frame;

use super::region::ScanRegion;

/// Recognition engine plugged into the decode worker.
///
/// Implementations receive a whole frame and return the decoded payload, or
/// `Ok(None)` when nothing was recognized. They run on the worker thread only
/// and must not touch pipeline state. A returned fault is logged and treated
/// like an empty result.
pub trait Decoder: Send {
    fn decode(&mut self, frame: &Frame) -> Result<Option<String>, DecodeFault>;

    /// Human-readable name for logging.
    fn name(&self) -> &str {
        "unnamed"
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DecodeFault {
    #[error("scan region {region:?} does not fit a {width}x{height} frame")]
    RegionOutOfFrame {
        region: ScanRegion,
        width: u32,
        height: u32,
    },
    #[error("decoder engine error: {0}")]
    Engine(String),
    #[error("decoder panicked: {0}")]
    Panicked(String),
}
