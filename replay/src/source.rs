use std::path::{Path, PathBuf};
use std::time::Duration;

use frame_scan_common::frame::Frame;
use frame_scan_pipeline::{CaptureError, FrameSink, FrameSource};
use tracing::{debug, info};

use crate::ReplayError;

const IMAGE_EXTENSIONS: &[&str] = &[
    "png", "jpg", "jpeg", "bmp", "pgm", "pnm", "gif", "webp", "tif", "tiff",
];

/// Load every image in `dir`, sorted by file name, as greyscale frames.
pub fn load_frames(dir: &Path) -> Result<Vec<Frame>, ReplayError> {
    let entries =
        std::fs::read_dir(dir).map_err(|e| ReplayError::ReadDir(dir.display().to_string(), e))?;
    let mut paths: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| is_image(path))
        .collect();
    paths.sort();

    if paths.is_empty() {
        return Err(ReplayError::Empty(dir.display().to_string()));
    }

    paths
        .iter()
        .enumerate()
        .map(|(seq, path)| load_frame(path, seq as u64))
        .collect()
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

fn load_frame(path: &Path, seq: u64) -> Result<Frame, ReplayError> {
    let gray = image::open(path)
        .map_err(|e| ReplayError::Image(path.display().to_string(), e))?
        .to_luma8();
    let (width, height) = gray.dimensions();
    debug!(path = %path.display(), width, height, "loaded replay frame");
    Ok(Frame::new(gray.into_raw(), width, height, seq)?)
}

/// Frame source that plays back still images, one per request, each
/// delivered `interval` after it was requested.
pub struct DirectorySource {
    frames: Vec<Frame>,
    interval: Duration,
    repeat: bool,
    next: usize,
    delivered: u64,
}

impl DirectorySource {
    pub fn new(frames: Vec<Frame>, interval: Duration, repeat: bool) -> Self {
        Self {
            frames,
            interval,
            repeat,
            next: 0,
            delivered: 0,
        }
    }

    fn next_frame(&mut self) -> Option<Frame> {
        if self.next >= self.frames.len() {
            if !self.repeat || self.frames.is_empty() {
                return None;
            }
            self.next = 0;
        }
        let frame = self.frames[self.next].clone().with_seq(self.delivered);
        self.next += 1;
        self.delivered += 1;
        Some(frame)
    }
}

impl FrameSource for DirectorySource {
    fn request_next_frame(&mut self, sink: FrameSink) {
        let Some(frame) = self.next_frame() else {
            info!(delivered = self.delivered, "replay exhausted");
            sink.fail(CaptureError::Disconnected);
            return;
        };

        let interval = self.interval;
        tokio::spawn(async move {
            tokio::time::sleep(interval).await;
            sink.deliver(frame);
        });
    }

    fn detach(&mut self) {
        debug!(delivered = self.delivered, "replay source detached");
    }
}
