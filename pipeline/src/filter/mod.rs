pub mod rescan;
pub mod throttle;

pub use rescan::{should_report, RescanGuard, ScanRecord};
pub use throttle::{should_submit, FrameThrottle};
