//! Live-frame decode pipeline: throttles a stream of camera frames, decodes
//! them one at a time on a dedicated worker thread, suppresses repeated
//! payloads and reports what was scanned back to the caller's task.

pub mod decoder;
pub mod error;
pub mod events;
pub mod filter;
pub mod scanner;
pub mod source;
pub mod worker;

pub use decoder::{BarcodeDecoder, DecodeFault, Decoder};
pub use error::PipelineError;
pub use events::{ScanEvent, ScanListener};
pub use scanner::{ScanStats, Scanner};
pub use source::{CaptureError, FrameSink, FrameSource};
