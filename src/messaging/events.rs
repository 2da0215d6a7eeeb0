//! Scanner events
//!
//! Events represent things that have happened (past tense).
//! They are broadcast to all subscribers.
use crate::error::CameraError;
use crate::scan::ScanState;
use crate::types::{DetectionEvent, StrategyState};

#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    /// A validated code passed the cooldown window
    Detected(DetectionEvent),

    /// Scan loop state changed
    StateChanged { old: ScanState, new: ScanState },

    /// Camera could not be acquired or stopped producing frames
    CameraFailed { error: CameraError, retryable: bool },

    /// A decode strategy changed lifecycle state
    StrategyStateChanged {
        name: &'static str,
        state: StrategyState,
    },
}

impl ScanEvent {
    /// The decoded text, for `Detected` events
    pub fn detected_text(&self) -> Option<&str> {
        match self {
            ScanEvent::Detected(event) => Some(event.text()),
            _ => None,
        }
    }
}
