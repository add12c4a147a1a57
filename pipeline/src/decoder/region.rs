use frame_scan_common::frame::Frame;
use image::{GrayImage, Luma};

use super::traits::DecodeFault;

/// Centred sub-rectangle of a frame that is handed to the recognizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanRegion {
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// Compute the centred region covering `fraction` of each dimension.
///
/// `fraction` is expected to be validated already; the result is never
/// smaller than 1x1 and never larger than the frame.
pub fn scan_region(width: u32, height: u32, fraction: f64) -> ScanRegion {
    let scan_width = ((width as f64 * fraction) as u32).clamp(1, width.max(1));
    let scan_height = ((height as f64 * fraction) as u32).clamp(1, height.max(1));
    ScanRegion {
        left: (width - scan_width) / 2,
        top: (height - scan_height) / 2,
        width: scan_width,
        height: scan_height,
    }
}

/// Copy the region out of the frame's luma plane into a standalone image.
pub fn crop_luma(frame: &Frame, region: ScanRegion) -> Result<GrayImage, DecodeFault> {
    let fits = |start: u32, len: u32, dim: u32| {
        start.checked_add(len).is_some_and(|end| end <= dim)
    };
    if region.width == 0
        || region.height == 0
        || !fits(region.left, region.width, frame.width())
        || !fits(region.top, region.height, frame.height())
    {
        return Err(DecodeFault::RegionOutOfFrame {
            region,
            width: frame.width(),
            height: frame.height(),
        });
    }

    let luma = frame.luma();
    let stride = frame.width() as usize;
    Ok(GrayImage::from_fn(region.width, region.height, |x, y| {
        let row = (region.top + y) as usize;
        let col = (region.left + x) as usize;
        Luma([luma[row * stride + col]])
    }))
}
