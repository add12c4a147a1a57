pub mod barcode;
pub mod region;
pub mod traits;

use frame_scan_common::config::{ConfigError, DecoderConfig};

pub use barcode::BarcodeDecoder;
pub use region::{scan_region, ScanRegion};
pub use traits::{DecodeFault, Decoder};

/// Builds a decoder from the current decoder settings at every `start()`.
pub type DecoderFactory =
    Box<dyn Fn(&DecoderConfig) -> Result<Box<dyn Decoder>, ConfigError> + Send + Sync>;

pub fn barcode_decoder_factory() -> DecoderFactory {
    Box::new(
        |config: &DecoderConfig| -> Result<Box<dyn Decoder>, ConfigError> {
            Ok(Box::new(BarcodeDecoder::new(config.clone())?))
        },
    )
}
