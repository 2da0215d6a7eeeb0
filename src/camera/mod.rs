//! Frame source
//!
//! Owns the camera session for one scanner and hands out a fresh
//! `FrameHandle` per tick.
//!
//! ## Architecture
//!
//! ```text
//! FrameSource
//!   ├── CameraBackend   (opens streams: nokhwa, or queued still images)
//!   └── CameraSession   (at most one; owns the CameraStream and its tracks)
//! ```
//!
//! Starting while a session is active releases the old stream first, so the
//! device lock is never requested twice.
pub mod frame;
#[cfg(feature = "camera")]
pub mod nokhwa_backend;
pub mod still;

use std::thread;
use std::time::Duration;

use image::RgbaImage;

use crate::config::{CameraConfig, FacingMode};
use crate::error::CameraError;

pub use frame::FrameHandle;
#[cfg(feature = "camera")]
pub use nokhwa_backend::NokhwaBackend;
pub use still::{FrameFeed, StillBackend};

/// Best-effort capture constraints; backends pick the closest supported mode
#[derive(Debug, Clone, PartialEq)]
pub struct CameraConstraints {
    pub facing: FacingMode,
    pub ideal_width: u32,
    pub ideal_height: u32,
    pub ideal_frame_rate: u32,
    pub device_index: Option<u32>,
}

impl From<&CameraConfig> for CameraConstraints {
    fn from(config: &CameraConfig) -> Self {
        Self {
            facing: config.facing,
            ideal_width: config.width,
            ideal_height: config.height,
            ideal_frame_rate: config.frame_rate,
            device_index: config.device_index,
        }
    }
}

/// Hardware zoom range reported by a track
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ZoomRange {
    pub min: f32,
    pub max: f32,
    pub step: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FocusMode {
    Continuous,
    Manual,
    Fixed,
}

/// What the active video track can do
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrackCapabilities {
    pub zoom: Option<ZoomRange>,
    pub torch: bool,
    pub focus_modes: Vec<FocusMode>,
}

/// A live stream from one camera
pub trait CameraStream {
    /// Human-readable device name
    fn label(&self) -> String;

    fn capabilities(&self) -> TrackCapabilities;

    /// Number of live media tracks held by this stream
    fn track_count(&self) -> usize;

    /// Latest frame, `None` while the device has not produced one yet
    fn grab(&mut self) -> Result<Option<RgbaImage>, CameraError>;

    fn set_zoom(&mut self, _zoom: f32) -> Result<(), CameraError> {
        Err(CameraError::Backend("zoom not supported".into()))
    }

    fn set_torch(&mut self, _on: bool) -> Result<(), CameraError> {
        Err(CameraError::Backend("torch not supported".into()))
    }

    /// Stop every track. Called once per stream.
    fn stop(&mut self);
}

/// Opens camera streams
pub trait CameraBackend: Send {
    fn open(&mut self, constraints: &CameraConstraints)
        -> Result<Box<dyn CameraStream>, CameraError>;
}

/// The single active camera session of a scanner
pub struct CameraSession {
    id: u64,
    label: String,
    capabilities: TrackCapabilities,
    started_at: i64,
    stream: Box<dyn CameraStream>,
}

impl CameraSession {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn capabilities(&self) -> &TrackCapabilities {
        &self.capabilities
    }

    pub fn started_at(&self) -> i64 {
        self.started_at
    }

    pub fn track_count(&self) -> usize {
        self.stream.track_count()
    }
}

/// Camera acquisition and per-tick frame access
pub struct FrameSource {
    backend: Box<dyn CameraBackend>,
    session: Option<CameraSession>,
    next_session_id: u64,
    sequence: u64,
    /// Starting deadline; cleared once the first real frame arrives
    first_frame_deadline: Option<i64>,
}

impl FrameSource {
    pub fn new(backend: Box<dyn CameraBackend>) -> Self {
        Self {
            backend,
            session: None,
            next_session_id: 1,
            sequence: 0,
            first_frame_deadline: None,
        }
    }

    /// Acquire the camera, releasing any previous session first.
    ///
    /// Retryable errors (`AlreadyInUse`, `Timeout`) are retried up to
    /// `config.max_retries` times, `retry_delay_ms` apart.
    pub fn start(&mut self, config: &CameraConfig, now_ms: i64) -> Result<&CameraSession, CameraError> {
        if self.session.is_some() {
            tracing::info!("Releasing previous camera session before restart");
            self.stop();
        }

        let constraints = CameraConstraints::from(config);
        let attempts = config.max_retries.max(1);
        let mut attempt = 0;

        let stream = loop {
            attempt += 1;
            match self.backend.open(&constraints) {
                Ok(stream) => break stream,
                Err(err) if err.is_retryable() && attempt < attempts => {
                    tracing::warn!(
                        "Camera acquisition failed ({}), retrying ({}/{})",
                        err,
                        attempt,
                        attempts
                    );
                    if config.retry_delay_ms > 0 {
                        thread::sleep(Duration::from_millis(config.retry_delay_ms));
                    }
                }
                Err(err) => {
                    tracing::error!("Camera acquisition failed: {}", err);
                    return Err(err);
                }
            }
        };

        let id = self.next_session_id;
        self.next_session_id += 1;
        self.sequence = 0;
        self.first_frame_deadline = Some(now_ms + config.acquire_timeout_ms as i64);

        let label = stream.label();
        let capabilities = stream.capabilities();
        tracing::info!(
            "✓ Camera session #{} started: {} (zoom: {:?}, torch: {})",
            id,
            label,
            capabilities.zoom,
            capabilities.torch
        );

        let session = self.session.insert(CameraSession {
            id,
            label,
            capabilities,
            started_at: now_ms,
            stream,
        });
        Ok(session)
    }

    /// Stop all tracks. No-op when nothing is running.
    pub fn stop(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.stream.stop();
            tracing::info!("Camera session #{} stopped", session.id);
        }
        self.first_frame_deadline = None;
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&CameraSession> {
        self.session.as_ref()
    }

    /// Fresh frame for this tick.
    ///
    /// `Ok(None)` until the stream delivers a frame with nonzero size; callers
    /// keep polling. Fails with `Timeout` if that takes longer than the
    /// configured acquisition timeout.
    pub fn current_frame(&mut self, now_ms: i64) -> Result<Option<FrameHandle>, CameraError> {
        let Some(session) = self.session.as_mut() else {
            return Ok(None);
        };

        let image = session.stream.grab()?;
        match image {
            Some(image) if image.width() > 0 && image.height() > 0 => {
                self.first_frame_deadline = None;
                self.sequence += 1;
                Ok(Some(FrameHandle::new(image, now_ms, self.sequence)))
            }
            _ => match self.first_frame_deadline {
                Some(deadline) if now_ms >= deadline => Err(CameraError::Timeout),
                _ => Ok(None),
            },
        }
    }

    /// Apply hardware zoom on the active track
    pub fn set_zoom(&mut self, zoom: f32) -> Result<(), CameraError> {
        match self.session.as_mut() {
            Some(session) => session.stream.set_zoom(zoom),
            None => Err(CameraError::Backend("no active camera session".into())),
        }
    }

    pub fn set_torch(&mut self, on: bool) -> Result<(), CameraError> {
        match self.session.as_mut() {
            Some(session) => session.stream.set_torch(on),
            None => Err(CameraError::Backend("no active camera session".into())),
        }
    }
}

impl Drop for FrameSource {
    fn drop(&mut self) {
        self.stop();
    }
}
