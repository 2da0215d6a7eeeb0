//! Scan loop and its lifecycle
//!
//! ```text
//! ScanController (any thread)
//!   └── command channel ──> scan thread
//!                             └── ScanLoop
//!                                   ├── FrameSource
//!                                   ├── StrategyArbiter
//!                                   ├── PayloadValidator
//!                                   └── DetectionDebouncer
//! ```
pub mod controller;
pub mod scan_loop;
pub mod state;
pub mod stats;

pub use controller::ScanController;
pub use scan_loop::{DetectionCallback, ScanLoop, SessionToken, TickOutcome};
pub use state::{ScanFault, ScanState, ScanStateMachine};
pub use stats::{ScanStats, TickTiming};
