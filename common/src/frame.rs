use bytes::Bytes;

/// A raw camera frame handed from a capture layer to the decode pipeline.
///
/// Buffer layout:
///   [0..width*height]  luminance plane (8-bit, row-major, no padding)
///   [width*height..]   optional chroma planes (NV21 / YUV420), carried but unused
///
/// Plain 8-bit greyscale images are valid frames with no trailing chroma.
#[derive(Debug, Clone)]
pub struct Frame {
    data: Bytes,
    width: u32,
    height: u32,
    seq: u64,
}

impl Frame {
    /// Build a frame, checking that the buffer holds at least a full luma plane.
    pub fn new(
        data: impl Into<Bytes>,
        width: u32,
        height: u32,
        seq: u64,
    ) -> Result<Self, FrameError> {
        if width == 0 || height == 0 {
            return Err(FrameError::ZeroDimension { width, height });
        }
        let data = data.into();
        let expected = width as usize * height as usize;
        if data.len() < expected {
            return Err(FrameError::TooShort {
                got: data.len(),
                expected,
            });
        }
        Ok(Self {
            data,
            width,
            height,
            seq,
        })
    }

    /// Same pixels under a new sequence number.
    pub fn with_seq(mut self, seq: u64) -> Self {
        self.seq = seq;
        self
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Sequence number assigned by the frame source.
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// The whole buffer, chroma included.
    pub fn data(&self) -> &Bytes {
        &self.data
    }

    /// The luminance plane only.
    pub fn luma(&self) -> &[u8] {
        &self.data[..self.pixel_count()]
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("frame dimensions must be at least 1x1, got {width}x{height}")]
    ZeroDimension { width: u32, height: u32 },
    #[error("frame buffer too short: got {got} bytes, expected at least {expected}")]
    TooShort { got: usize, expected: usize },
}
