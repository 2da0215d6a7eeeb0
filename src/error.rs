//! Scanner errors
//!
//! Only `CameraError` ever reaches the user interface. Everything else is
//! absorbed inside the detection core and shows up as "nothing this tick".
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("No camera found on this device")]
    NotFound,

    #[error("Camera is in use by another application")]
    AlreadyInUse,

    #[error("Camera did not produce a frame in time")]
    Timeout,

    #[error("Camera backend error: {0}")]
    Backend(String),
}

impl CameraError {
    /// Whether a later attempt may succeed without user action
    pub fn is_retryable(&self) -> bool {
        matches!(self, CameraError::AlreadyInUse | CameraError::Timeout)
    }

    /// Short hint shown next to the retry action
    pub fn user_hint(&self) -> &'static str {
        match self {
            CameraError::PermissionDenied => "Please allow camera access and try again",
            CameraError::NotFound => "No camera found on your device",
            CameraError::AlreadyInUse => "Close other apps using the camera and retry",
            CameraError::Timeout => "The camera took too long to start, retry",
            CameraError::Backend(_) => "The camera failed to start",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyInitError {
    /// Capability absent in this environment (not a fault)
    #[error("Strategy unavailable: {0}")]
    Unavailable(String),

    /// Initialization was attempted and failed; never retried
    #[error("Strategy initialization failed: {0}")]
    Failed(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Frame decode failed: {0}")]
pub struct DecodeFrameError(pub String);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid detection payload {text:?}: {reason}")]
pub struct InvalidDetectionFormat {
    pub text: String,
    pub reason: String,
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load configuration from {path}")]
    LoadFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Failed to save configuration to {path}")]
    SaveFailed {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to create config directory: {path}")]
    DirectoryCreationFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Could not determine the user config directory")]
    NoConfigDir,
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Scanner is already running")]
    AlreadyRunning,

    #[error("Scanner is not running")]
    NotRunning,

    #[error("Scanner is not paused")]
    NotPaused,

    #[error("Cannot perform action in the current scanner state")]
    InvalidTransition,
}
