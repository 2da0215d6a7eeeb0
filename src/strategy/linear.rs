//! Linear (1-D) barcode strategy
//!
//! Runs the rxing multi-format reader restricted to one-dimensional
//! symbologies over the frame's luma plane.
use std::collections::{HashMap, HashSet};

use rxing::common::HybridBinarizer;
use rxing::{
    BarcodeFormat as RxFormat, BinaryBitmap, DecodeHintType, DecodeHintValue, Exceptions,
    Luma8LuminanceSource, MultiFormatReader, Reader,
};

use super::{DecodeStrategy, InitProgress};
use crate::camera::FrameHandle;
use crate::error::{DecodeFrameError, StrategyInitError};
use crate::types::{BarcodeFormat, DecodeResult, StrategyKind};

/// Symbologies handed to the reader
const LINEAR_FORMATS: [RxFormat; 8] = [
    RxFormat::CODE_128,
    RxFormat::EAN_13,
    RxFormat::EAN_8,
    RxFormat::CODE_39,
    RxFormat::UPC_A,
    RxFormat::UPC_E,
    RxFormat::CODABAR,
    RxFormat::ITF,
];

/// rxing hint values are not `Send`, so only the inputs are kept and the
/// hint map is rebuilt for each decode.
pub struct LinearStrategy {
    try_harder: bool,
    /// Filled by `initialize`; `None` until then
    formats: Option<HashSet<RxFormat>>,
}

impl LinearStrategy {
    pub fn new(try_harder: bool) -> Self {
        Self {
            try_harder,
            formats: None,
        }
    }

    fn hints(&self, formats: &HashSet<RxFormat>) -> HashMap<DecodeHintType, DecodeHintValue> {
        let mut hints = HashMap::new();
        hints.insert(
            DecodeHintType::POSSIBLE_FORMATS,
            DecodeHintValue::PossibleFormats(formats.clone()),
        );
        if self.try_harder {
            hints.insert(DecodeHintType::TRY_HARDER, DecodeHintValue::TryHarder(true));
        }
        hints
    }
}

impl DecodeStrategy for LinearStrategy {
    fn name(&self) -> &'static str {
        "linear"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Linear
    }

    fn initialize(&mut self) -> Result<InitProgress, StrategyInitError> {
        self.formats = Some(LINEAR_FORMATS.iter().cloned().collect());
        tracing::info!("✓ Linear barcode reader initialized (try_harder: {})", self.try_harder);
        Ok(InitProgress::Ready)
    }

    fn detect(&mut self, frame: &FrameHandle) -> Result<Option<DecodeResult>, DecodeFrameError> {
        let Some(formats) = self.formats.as_ref() else {
            return Ok(None);
        };
        if frame.is_empty() {
            return Ok(None);
        }

        let luma = frame.luma();
        let (width, height) = luma.dimensions();
        let source = Luma8LuminanceSource::new(luma.into_raw(), width, height);
        let mut bitmap = BinaryBitmap::new(HybridBinarizer::new(source));
        let mut reader = MultiFormatReader::default();

        match reader.decode_with_hints(&mut bitmap, &self.hints(formats)) {
            Ok(result) => {
                let text = result.getText().to_string();
                if text.is_empty() {
                    return Ok(None);
                }
                let format = map_format(result.getBarcodeFormat());
                tracing::debug!("rxing decoded {} ({})", text, format);
                Ok(Some(DecodeResult::new(text, format, "linear")))
            }
            Err(Exceptions::NotFoundException(_))
            | Err(Exceptions::FormatException(_))
            | Err(Exceptions::ChecksumException(_)) => Ok(None),
            Err(e) => Err(DecodeFrameError(e.to_string())),
        }
    }
}

/// rxing symbology to scanner symbology
pub(crate) fn map_format(format: &RxFormat) -> BarcodeFormat {
    match format {
        RxFormat::CODE_128 => BarcodeFormat::Code128,
        RxFormat::EAN_13 => BarcodeFormat::Ean13,
        RxFormat::EAN_8 => BarcodeFormat::Ean8,
        RxFormat::CODE_39 => BarcodeFormat::Code39,
        RxFormat::UPC_A => BarcodeFormat::UpcA,
        RxFormat::UPC_E => BarcodeFormat::UpcE,
        RxFormat::CODABAR => BarcodeFormat::Codabar,
        RxFormat::ITF => BarcodeFormat::I2of5,
        RxFormat::QR_CODE => BarcodeFormat::Qr,
        RxFormat::DATA_MATRIX => BarcodeFormat::DataMatrix,
        _ => BarcodeFormat::Unknown,
    }
}
