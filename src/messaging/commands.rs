//! Scanner commands
//!
//! Commands represent requests to perform actions (imperative).
//! They are executed in order on the scan thread.
use crate::zoom::ZoomGesture;

#[derive(Debug, Clone, PartialEq)]
pub enum ScanCommand {
    /// Acquire the camera and begin polling
    Start,

    /// Stop polling, keep the camera
    Pause,

    Resume,

    /// Page/tab visibility changed
    SetVisible(bool),

    Zoom(ZoomGesture),

    /// Turn the torch on or off, when the track has one
    Torch(bool),

    /// Release the camera
    Stop,

    /// Stop and exit the scan thread
    Shutdown,
}

impl ScanCommand {
    /// Get a human-readable description of the command
    pub fn description(&self) -> &'static str {
        match self {
            ScanCommand::Start => "Start scanning",
            ScanCommand::Pause => "Pause scanning",
            ScanCommand::Resume => "Resume scanning",
            ScanCommand::SetVisible(_) => "Update visibility",
            ScanCommand::Zoom(_) => "Zoom",
            ScanCommand::Torch(_) => "Toggle torch",
            ScanCommand::Stop => "Stop scanning",
            ScanCommand::Shutdown => "Shut down scanner",
        }
    }
}
