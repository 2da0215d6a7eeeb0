//! Zoom controller
//!
//! Maps pinch and wheel gestures to a zoom factor. The factor is applied to
//! the camera track when it reports a zoom range, otherwise as a center crop
//! of each frame before decoding. Independent of detection.
use crate::camera::TrackCapabilities;
use crate::config::ZoomConfig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ZoomGesture {
    /// Two fingers down, `distance` apart (any unit)
    PinchBegin { distance: f32 },
    PinchUpdate { distance: f32 },
    PinchEnd,
    /// Positive `delta_y` scrolls down (zoom out)
    Wheel { delta_y: f32 },
    Set(f32),
}

/// Where the zoom factor is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomTarget {
    Hardware,
    Software,
}

#[derive(Debug, Clone, Copy)]
struct Pinch {
    start_distance: f32,
    start_zoom: f32,
}

pub struct ZoomController {
    config: ZoomConfig,
    min: f32,
    max: f32,
    current: f32,
    target: ZoomTarget,
    pinch: Option<Pinch>,
}

impl ZoomController {
    pub fn new(config: &ZoomConfig) -> Self {
        Self {
            config: config.clone(),
            min: config.min,
            max: config.max.max(config.min),
            current: config.min,
            target: ZoomTarget::Software,
            pinch: None,
        }
    }

    /// Adopt the track's zoom range, if it has one. Resets to minimum zoom.
    pub fn attach(&mut self, capabilities: &TrackCapabilities) {
        match capabilities.zoom {
            Some(range) if range.max > range.min => {
                self.target = ZoomTarget::Hardware;
                self.min = range.min;
                self.max = range.max.min(self.config.max).max(range.min);
            }
            _ => self.use_software(),
        }
        self.current = self.min;
        self.pinch = None;
        tracing::debug!(
            "Zoom target {:?}, range {:.1}..{:.1}",
            self.target,
            self.min,
            self.max
        );
    }

    /// Switch to cropping, e.g. after the track rejected a zoom constraint
    pub fn use_software(&mut self) {
        self.target = ZoomTarget::Software;
        self.min = self.config.min;
        self.max = self.config.max.max(self.config.min);
        self.current = self.current.clamp(self.min, self.max);
    }

    pub fn current(&self) -> f32 {
        self.current
    }

    pub fn target(&self) -> ZoomTarget {
        self.target
    }

    /// Crop factor to apply to frames (1.0 when the track zooms itself)
    pub fn software_factor(&self) -> f32 {
        match self.target {
            ZoomTarget::Software => self.current,
            ZoomTarget::Hardware => 1.0,
        }
    }

    /// Apply a gesture. Returns the new factor when it changed.
    pub fn apply(&mut self, gesture: ZoomGesture) -> Option<f32> {
        let before = self.current;
        match gesture {
            ZoomGesture::PinchBegin { distance } => self.pinch_begin(distance),
            ZoomGesture::PinchUpdate { distance } => {
                self.pinch_update(distance);
            }
            ZoomGesture::PinchEnd => self.pinch_end(),
            ZoomGesture::Wheel { delta_y } => {
                self.wheel(delta_y);
            }
            ZoomGesture::Set(value) => {
                self.set(value);
            }
        }
        (self.current != before).then_some(self.current)
    }

    pub fn pinch_begin(&mut self, distance: f32) {
        if distance > 0.0 {
            self.pinch = Some(Pinch {
                start_distance: distance,
                start_zoom: self.current,
            });
        }
    }

    /// Scale the zoom at pinch start by how far the fingers spread
    pub fn pinch_update(&mut self, distance: f32) -> f32 {
        if let Some(pinch) = self.pinch {
            if distance > 0.0 {
                self.set(pinch.start_zoom * distance / pinch.start_distance);
            }
        }
        self.current
    }

    pub fn pinch_end(&mut self) {
        self.pinch = None;
    }

    pub fn wheel(&mut self, delta_y: f32) -> f32 {
        if delta_y != 0.0 {
            self.set(self.current - delta_y.signum() * self.config.wheel_step);
        }
        self.current
    }

    pub fn set(&mut self, value: f32) -> f32 {
        if value.is_finite() {
            self.current = value.clamp(self.min, self.max);
        }
        self.current
    }
}
