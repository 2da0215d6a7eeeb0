//! Multi-strategy barcode detection core for a self-checkout scanner.
//!
//! A [`ScanLoop`] pulls frames from a [`FrameSource`], asks the
//! [`StrategyArbiter`] to decode them (native, ML, linear and QR strategies,
//! first match wins), validates the payload, suppresses repeats with a
//! [`DetectionDebouncer`] and reports [`DetectionEvent`]s through a callback
//! and an [`EventBus`]. [`ScanController`] runs the loop on its own thread.

pub mod arbiter;
pub mod camera;
pub mod clock;
pub mod config;
pub mod debounce;
pub mod error;
pub mod messaging;
pub mod scan;
pub mod strategy;
pub mod types;
pub mod validate;
pub mod zoom;

pub use arbiter::StrategyArbiter;
pub use camera::{CameraBackend, CameraSession, CameraStream, FrameFeed, FrameHandle, FrameSource, StillBackend};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ScannerConfig;
pub use debounce::DetectionDebouncer;
pub use error::{CameraError, ConfigError, DecodeFrameError, InvalidDetectionFormat, StrategyInitError, TransitionError};
pub use messaging::{EventBus, ScanCommand, ScanEvent};
pub use scan::{ScanController, ScanFault, ScanLoop, ScanState, TickOutcome};
pub use strategy::{build_strategies, DecodeStrategy};
pub use types::{BarcodeFormat, DecodeResult, DetectionEvent, StrategyKind, StrategyState};
pub use validate::{BasicValidator, PayloadValidator, RetailCodeValidator};
pub use zoom::{ZoomController, ZoomGesture};
