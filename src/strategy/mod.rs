//! Decode strategies
//!
//! Each strategy turns one frame into zero or one decoded string.
//!
//! ## Architecture
//!
//! ```text
//! StrategyArbiter
//!   ├── NativeStrategy  (platform barcode API, when the host has one)
//!   ├── MlStrategy      (model-based detector, loaded lazily off-thread)
//!   ├── LinearStrategy  (rxing multi-format reader, 1-D symbologies)
//!   └── QrStrategy      (rqrr, normal + inverted + contrast-boosted passes)
//! ```
//!
//! Only `initialize`/`poll_initialized` errors change a strategy's lifecycle.
//! A `detect` error means "nothing on this frame".
pub mod linear;
pub mod ml;
pub mod native;
pub mod qr;

use crate::camera::FrameHandle;
use crate::config::ScannerConfig;
use crate::error::{DecodeFrameError, StrategyInitError};
use crate::types::{DecodeResult, StrategyKind};

pub use linear::LinearStrategy;
pub use ml::{Candidate, InferenceModel, MlStrategy, ModelLoader};
pub use native::{NativeStrategy, PlatformBarcodeApi, PlatformCode};
pub use qr::QrStrategy;

/// Outcome of a successful initialization step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitProgress {
    Ready,
    /// Still loading in the background; poll again next tick
    Pending,
}

/// Strategy trait
///
/// Implement this trait to plug another decoding engine into the arbiter.
pub trait DecodeStrategy: Send {
    /// Strategy name (for logging and `DecodeResult::strategy_used`)
    fn name(&self) -> &'static str;

    fn kind(&self) -> StrategyKind;

    /// Called exactly once per session
    fn initialize(&mut self) -> Result<InitProgress, StrategyInitError>;

    /// Called once per tick while the strategy is `Initializing`. Must not block.
    fn poll_initialized(&mut self) -> Result<InitProgress, StrategyInitError> {
        Ok(InitProgress::Ready)
    }

    fn detect(&mut self, frame: &FrameHandle) -> Result<Option<DecodeResult>, DecodeFrameError>;
}

/// Build the standard strategy set from configuration.
///
/// The native strategy is always present (it reports itself unavailable when
/// `platform` is `None`); the ML strategy only when enabled and a loader is
/// supplied.
pub fn build_strategies(
    config: &ScannerConfig,
    platform: Option<Box<dyn PlatformBarcodeApi>>,
    model: Option<Box<dyn ModelLoader>>,
) -> Vec<Box<dyn DecodeStrategy>> {
    let mut strategies: Vec<Box<dyn DecodeStrategy>> = Vec::with_capacity(4);

    strategies.push(Box::new(NativeStrategy::new(platform)));

    match model {
        Some(loader) if config.ml.enabled => {
            strategies.push(Box::new(MlStrategy::new(loader, config.ml.min_confidence)));
        }
        Some(_) => tracing::debug!("ML strategy supplied but disabled in config"),
        None => {}
    }

    strategies.push(Box::new(LinearStrategy::new(config.linear.try_harder)));
    strategies.push(Box::new(QrStrategy::new(
        config.qr.try_inverted,
        config.qr.contrast_boost,
    )));

    strategies
}
