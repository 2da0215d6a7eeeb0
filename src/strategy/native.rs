//! Platform barcode detector
//!
//! Wraps whatever barcode API the host platform supplies. Absence of such an
//! API is a capability check made once at initialization, not an error.
use super::{DecodeStrategy, InitProgress};
use crate::camera::FrameHandle;
use crate::error::{DecodeFrameError, StrategyInitError};
use crate::types::{BarcodeFormat, DecodeResult, StrategyKind};

/// One code reported by the platform API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformCode {
    pub raw_value: String,
    pub format: BarcodeFormat,
}

/// Host-supplied barcode detection
pub trait PlatformBarcodeApi: Send {
    /// Formats the platform can decode; empty means unusable
    fn supported_formats(&self) -> Vec<BarcodeFormat>;

    fn detect(&mut self, frame: &FrameHandle) -> Result<Vec<PlatformCode>, String>;
}

pub struct NativeStrategy {
    api: Option<Box<dyn PlatformBarcodeApi>>,
}

impl NativeStrategy {
    pub fn new(api: Option<Box<dyn PlatformBarcodeApi>>) -> Self {
        Self { api }
    }

    /// A strategy for hosts without a barcode API
    pub fn absent() -> Self {
        Self::new(None)
    }
}

impl DecodeStrategy for NativeStrategy {
    fn name(&self) -> &'static str {
        "native"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Native
    }

    fn initialize(&mut self) -> Result<InitProgress, StrategyInitError> {
        let Some(api) = self.api.as_ref() else {
            return Err(StrategyInitError::Unavailable(
                "no platform barcode detector".into(),
            ));
        };

        let formats = api.supported_formats();
        if formats.is_empty() {
            self.api = None;
            return Err(StrategyInitError::Unavailable(
                "platform detector supports no formats".into(),
            ));
        }

        tracing::info!("✓ Native barcode detector available ({} formats)", formats.len());
        Ok(InitProgress::Ready)
    }

    fn detect(&mut self, frame: &FrameHandle) -> Result<Option<DecodeResult>, DecodeFrameError> {
        let Some(api) = self.api.as_mut() else {
            return Ok(None);
        };

        let codes = api.detect(frame).map_err(DecodeFrameError)?;
        Ok(codes
            .into_iter()
            .find(|code| !code.raw_value.is_empty())
            .map(|code| DecodeResult::new(code.raw_value, code.format, "native")))
    }
}
