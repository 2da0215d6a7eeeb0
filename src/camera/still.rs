//! Still-image camera backend
//!
//! Serves queued images as camera frames, one per grab. Used to run
//! image files through the same scan loop as a live camera, and to script
//! the camera in tests. Like real hardware it allows one open stream at a
//! time.
use std::collections::VecDeque;
use std::sync::Arc;

use image::RgbaImage;
use parking_lot::Mutex;

use super::{CameraBackend, CameraConstraints, CameraStream, TrackCapabilities};
use crate::error::CameraError;

#[derive(Default)]
struct FeedState {
    frames: VecDeque<RgbaImage>,
    live_tracks: usize,
    opened: usize,
    /// Errors returned by the next `open` calls, in order
    open_errors: VecDeque<CameraError>,
}

/// Shared handle to the queued frames and device bookkeeping
#[derive(Clone, Default)]
pub struct FrameFeed {
    state: Arc<Mutex<FeedState>>,
}

impl FrameFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a frame for the next grab
    pub fn push(&self, frame: RgbaImage) {
        self.state.lock().frames.push_back(frame);
    }

    /// Make the next `open` fail with `error`
    pub fn fail_next_open(&self, error: CameraError) {
        self.state.lock().open_errors.push_back(error);
    }

    pub fn pending(&self) -> usize {
        self.state.lock().frames.len()
    }

    /// Tracks held by open streams
    pub fn live_tracks(&self) -> usize {
        self.state.lock().live_tracks
    }

    /// Streams opened so far
    pub fn opened(&self) -> usize {
        self.state.lock().opened
    }
}

pub struct StillBackend {
    feed: FrameFeed,
    capabilities: TrackCapabilities,
}

impl StillBackend {
    pub fn new(feed: FrameFeed) -> Self {
        Self {
            feed,
            capabilities: TrackCapabilities::default(),
        }
    }

    /// Report these capabilities for every stream
    pub fn with_capabilities(mut self, capabilities: TrackCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }
}

impl CameraBackend for StillBackend {
    fn open(&mut self, _constraints: &CameraConstraints) -> Result<Box<dyn CameraStream>, CameraError> {
        let mut state = self.feed.state.lock();
        if let Some(error) = state.open_errors.pop_front() {
            return Err(error);
        }
        if state.live_tracks > 0 {
            return Err(CameraError::AlreadyInUse);
        }
        state.live_tracks += 1;
        state.opened += 1;

        Ok(Box::new(StillStream {
            feed: self.feed.clone(),
            capabilities: self.capabilities.clone(),
            zoom: 1.0,
            stopped: false,
        }))
    }
}

struct StillStream {
    feed: FrameFeed,
    capabilities: TrackCapabilities,
    zoom: f32,
    stopped: bool,
}

impl CameraStream for StillStream {
    fn label(&self) -> String {
        "still images".into()
    }

    fn capabilities(&self) -> TrackCapabilities {
        self.capabilities.clone()
    }

    fn track_count(&self) -> usize {
        usize::from(!self.stopped)
    }

    fn grab(&mut self) -> Result<Option<RgbaImage>, CameraError> {
        if self.stopped {
            return Ok(None);
        }
        Ok(self.feed.state.lock().frames.pop_front())
    }

    fn set_zoom(&mut self, zoom: f32) -> Result<(), CameraError> {
        match self.capabilities.zoom {
            Some(range) if zoom >= range.min && zoom <= range.max => {
                self.zoom = zoom;
                tracing::debug!("Still stream zoom {:.2}", self.zoom);
                Ok(())
            }
            Some(_) => Err(CameraError::Backend(format!("zoom {zoom} out of range"))),
            None => Err(CameraError::Backend("zoom not supported".into())),
        }
    }

    fn stop(&mut self) {
        if !self.stopped {
            self.stopped = true;
            self.feed.state.lock().live_tracks -= 1;
        }
    }
}

impl Drop for StillStream {
    fn drop(&mut self) {
        self.stop();
    }
}
