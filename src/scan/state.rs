//! Scan loop state machine
//!
//! `Idle → Starting → Running ⇄ Paused → Stopped`, with `Error` reachable from
//! any active state when the camera fails or no strategy can ever decode.
use crate::error::{CameraError, TransitionError};

/// Why a session ended in the error state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanFault {
    Camera(CameraError),
    /// Every strategy is unavailable or failed
    NoStrategies,
}

impl std::fmt::Display for ScanFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanFault::Camera(e) => write!(f, "{}", e),
            ScanFault::NoStrategies => write!(f, "No barcode decoder is available"),
        }
    }
}

/// State of one scanner
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScanState {
    /// Never started
    #[default]
    Idle,

    /// Camera acquired, waiting for the first frame and a ready strategy
    Starting,

    /// Polling frames
    Running { since: i64 },

    /// Hidden; camera held, no polling
    Paused,

    /// Camera released
    Stopped,

    Error(ScanFault),
}

impl ScanState {
    pub fn is_running(&self) -> bool {
        matches!(self, ScanState::Running { .. })
    }

    /// Holding the camera
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            ScanState::Starting | ScanState::Running { .. } | ScanState::Paused
        )
    }

    /// Whether the loop should schedule another tick
    pub fn wants_ticks(&self) -> bool {
        matches!(self, ScanState::Starting | ScanState::Running { .. })
    }

    pub fn description(&self) -> &'static str {
        match self {
            ScanState::Idle => "Idle",
            ScanState::Starting => "Starting...",
            ScanState::Running { .. } => "Running",
            ScanState::Paused => "Paused",
            ScanState::Stopped => "Stopped",
            ScanState::Error(_) => "Error",
        }
    }
}

/// Guards the legal transitions between `ScanState`s
#[derive(Debug, Default)]
pub struct ScanStateMachine {
    state: ScanState,
}

impl ScanStateMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &ScanState {
        &self.state
    }

    /// Idle, Stopped or Error → Starting
    pub fn start(&mut self) -> Result<(), TransitionError> {
        match self.state {
            ScanState::Idle | ScanState::Stopped | ScanState::Error(_) => {
                self.state = ScanState::Starting;
                Ok(())
            }
            ScanState::Starting | ScanState::Running { .. } | ScanState::Paused => {
                Err(TransitionError::AlreadyRunning)
            }
        }
    }

    /// Starting → Running
    pub fn mark_running(&mut self, now_ms: i64) -> Result<(), TransitionError> {
        match self.state {
            ScanState::Starting => {
                self.state = ScanState::Running { since: now_ms };
                Ok(())
            }
            _ => Err(TransitionError::InvalidTransition),
        }
    }

    /// Running → Paused
    pub fn pause(&mut self) -> Result<(), TransitionError> {
        match self.state {
            ScanState::Running { .. } => {
                self.state = ScanState::Paused;
                Ok(())
            }
            _ => Err(TransitionError::NotRunning),
        }
    }

    /// Paused → Running
    pub fn resume(&mut self, now_ms: i64) -> Result<(), TransitionError> {
        match self.state {
            ScanState::Paused => {
                self.state = ScanState::Running { since: now_ms };
                Ok(())
            }
            _ => Err(TransitionError::NotPaused),
        }
    }

    /// Any active state → Stopped. Returns false (no-op) otherwise.
    pub fn stop(&mut self) -> bool {
        if self.state.is_active() {
            self.state = ScanState::Stopped;
            true
        } else {
            false
        }
    }

    /// Any active state → Error
    pub fn fail(&mut self, fault: ScanFault) -> Result<(), TransitionError> {
        if self.state.is_active() {
            self.state = ScanState::Error(fault);
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition)
        }
    }
}
