use frame_scan_common::config::{ConfigError, DecoderConfig};
use frame_scan_common::frame::Frame;
use image::{imageops, GrayImage};
use rxing::common::HybridBinarizer;
use rxing::{
    BinaryBitmap, DecodeHintType, DecodeHintValue, DecodingHintDictionary,
    Luma8LuminanceSource, MultiFormatReader, Reader,
};
use tracing::trace;

use super::region::{crop_luma, scan_region};
use super::traits::{DecodeFault, Decoder};

/// Default decoder: multi-format barcode recognition (QR, Data Matrix,
/// Aztec, PDF417, EAN/UPC, Code 128/39/93, ITF, Codabar...) on the centred
/// scan area of the luma plane.
///
/// Each frame is tried as-is first, then (when `try_rotated` is set) rotated
/// by 90°. 2D symbols are found in any orientation, but 1D readers only scan
/// along rows, so a barcode held vertically needs the rotated view.
pub struct BarcodeDecoder {
    config: DecoderConfig,
}

impl BarcodeDecoder {
    pub fn new(config: DecoderConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DecoderConfig {
        &self.config
    }

    fn recognize(&self, view: &GrayImage) -> Option<String> {
        let source =
            Luma8LuminanceSource::new(view.as_raw().clone(), view.width(), view.height());
        let mut bitmap = BinaryBitmap::new(HybridBinarizer::new(source));
        let mut reader = MultiFormatReader::default();

        match reader.decode_with_hints(&mut bitmap, &self.hints()) {
            Ok(result) if !result.getText().is_empty() => Some(result.getText().to_owned()),
            Ok(_) => None,
            Err(e) => {
                trace!(error = %e, "no symbol in view");
                None
            }
        }
    }

    fn hints(&self) -> DecodingHintDictionary {
        let mut hints = DecodingHintDictionary::new();
        hints.insert(
            DecodeHintType::TRY_HARDER,
            DecodeHintValue::TryHarder(self.config.try_harder),
        );
        hints.insert(
            DecodeHintType::CHARACTER_SET,
            DecodeHintValue::CharacterSet("UTF-8".to_owned()),
        );
        hints
    }
}

impl Decoder for BarcodeDecoder {
    fn decode(&mut self, frame: &Frame) -> Result<Option<String>, DecodeFault> {
        let region = scan_region(frame.width(), frame.height(), self.config.scan_area_fraction);
        let upright = crop_luma(frame, region)?;

        if let Some(payload) = self.recognize(&upright) {
            return Ok(Some(payload));
        }
        if !self.config.try_rotated {
            return Ok(None);
        }

        let rotated = imageops::rotate90(&upright);
        Ok(self.recognize(&rotated))
    }

    fn name(&self) -> &str {
        "barcode"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;
    use qrcode::{Color, QrCode};
    use rxing::{BarcodeFormat, MultiFormatWriter, Writer};

    /// Render `text` as a QR symbol with `scale` pixels per module onto a
    /// white canvas, top-left module at `origin`.
    fn render_qr(text: &str, canvas: (u32, u32), origin: (u32, u32), scale: u32) -> Frame {
        let code = QrCode::new(text.as_bytes()).unwrap();
        let modules = code.width() as u32;
        let colors = code.to_colors();
        let (width, height) = canvas;
        let mut buf = vec![255u8; (width * height) as usize];

        for my in 0..modules {
            for mx in 0..modules {
                if !matches!(colors[(my * modules + mx) as usize], Color::Dark) {
                    continue;
                }
                for dy in 0..scale {
                    for dx in 0..scale {
                        let x = origin.0 + mx * scale + dx;
                        let y = origin.1 + my * scale + dy;
                        buf[(y * width + x) as usize] = 0;
                    }
                }
            }
        }
        Frame::new(buf, width, height, 0).unwrap()
    }

    /// Render `text` as a Code 128 barcode, 2 px per module and 60 px tall,
    /// with bars running vertically (or horizontally when `sideways`).
    fn render_code128(text: &str, sideways: bool) -> Frame {
        const SCALE: u32 = 2;
        const MARGIN: u32 = 20;
        const BAR_HEIGHT: u32 = 60;

        let matrix = MultiFormatWriter::default()
            .encode(text, &BarcodeFormat::CODE_128, 0, 1)
            .unwrap();
        let modules = matrix.getWidth();
        let mut image = GrayImage::from_pixel(
            modules * SCALE + 2 * MARGIN,
            BAR_HEIGHT + 2 * MARGIN,
            Luma([255u8]),
        );
        for module in 0..modules {
            if !matrix.get(module, 0) {
                continue;
            }
            for dx in 0..SCALE {
                for y in MARGIN..MARGIN + BAR_HEIGHT {
                    image.put_pixel(MARGIN + module * SCALE + dx, y, Luma([0u8]));
                }
            }
        }

        let image = if sideways {
            imageops::rotate90(&image)
        } else {
            image
        };
        let (width, height) = image.dimensions();
        Frame::new(image.into_raw(), width, height, 0).unwrap()
    }

    fn decoder(scan_area_fraction: f64, try_rotated: bool, try_harder: bool) -> BarcodeDecoder {
        BarcodeDecoder::new(DecoderConfig {
            scan_area_fraction,
            try_rotated,
            try_harder,
        })
        .unwrap()
    }

    #[test]
    fn decodes_centred_qr_code() {
        let frame = render_qr("HELLO", (200, 200), (58, 58), 4);
        let mut decoder = BarcodeDecoder::new(DecoderConfig::default()).unwrap();
        assert_eq!(decoder.decode(&frame).unwrap().as_deref(), Some("HELLO"));
    }

    #[test]
    fn code_outside_scan_area_is_ignored() {
        let frame = render_qr("CORNER", (400, 400), (16, 16), 4);
        assert_eq!(decoder(0.5, true, true).decode(&frame).unwrap(), None);
        assert_eq!(
            decoder(1.0, true, true).decode(&frame).unwrap().as_deref(),
            Some("CORNER")
        );
    }

    #[test]
    fn decodes_upright_linear_barcode() {
        let frame = render_code128("SCAN-42", false);
        assert_eq!(
            decoder(1.0, false, false).decode(&frame).unwrap().as_deref(),
            Some("SCAN-42")
        );
    }

    #[test]
    fn sideways_linear_barcode_needs_rotated_view() {
        let frame = render_code128("SCAN-42", true);
        assert_eq!(decoder(1.0, false, false).decode(&frame).unwrap(), None);
        assert_eq!(
            decoder(1.0, true, false).decode(&frame).unwrap().as_deref(),
            Some("SCAN-42")
        );
    }

    #[test]
    fn blank_frame_yields_nothing() {
        let frame = Frame::new(vec![128u8; 160 * 120], 160, 120, 0).unwrap();
        assert_eq!(decoder(0.7, true, true).decode(&frame).unwrap(), None);
    }

    #[test]
    fn rejects_invalid_scan_area() {
        for fraction in [0.0, 1.5] {
            let result = BarcodeDecoder::new(DecoderConfig {
                scan_area_fraction: fraction,
                ..Default::default()
            });
            assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
        }
        assert!(BarcodeDecoder::new(DecoderConfig {
            scan_area_fraction: 0.5,
            ..Default::default()
        })
        .is_ok());
    }
}
