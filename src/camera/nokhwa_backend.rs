//! nokhwa-backed camera capture
//!
//! Cross-platform webcam access (V4L2, AVFoundation, Media Foundation).
//! Frames are decoded to RGB by nokhwa and widened to RGBA here.
use image::RgbaImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    ApiBackend, CameraFormat, CameraIndex, ControlValueDescription, ControlValueSetter,
    FrameFormat, KnownCameraControl, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::{Camera, NokhwaError};

use super::{
    CameraBackend, CameraConstraints, CameraStream, FocusMode, FrameHandle, TrackCapabilities,
    ZoomRange,
};
use crate::config::FacingMode;
use crate::error::CameraError;

/// Opens the best matching local camera
#[derive(Debug, Default)]
pub struct NokhwaBackend;

impl NokhwaBackend {
    pub fn new() -> Self {
        Self
    }

    /// Pick a device: explicit index, else a back/rear camera for
    /// `Environment`, else the first device.
    fn select_device(constraints: &CameraConstraints) -> Result<CameraIndex, CameraError> {
        if let Some(index) = constraints.device_index {
            return Ok(CameraIndex::Index(index));
        }

        let devices = nokhwa::query(ApiBackend::Auto).map_err(map_error)?;
        if devices.is_empty() {
            return Err(CameraError::NotFound);
        }

        for device in &devices {
            tracing::debug!("Camera found: {} ({:?})", device.human_name(), device.index());
        }

        let preferred = match constraints.facing {
            FacingMode::Environment => devices.iter().find(|d| {
                let name = d.human_name().to_lowercase();
                name.contains("back") || name.contains("rear")
            }),
            FacingMode::User => devices.iter().find(|d| {
                let name = d.human_name().to_lowercase();
                name.contains("front") || name.contains("facetime")
            }),
        };

        Ok(preferred.unwrap_or(&devices[0]).index().clone())
    }
}

impl CameraBackend for NokhwaBackend {
    fn open(&mut self, constraints: &CameraConstraints) -> Result<Box<dyn CameraStream>, CameraError> {
        let index = Self::select_device(constraints)?;

        let format = CameraFormat::new(
            Resolution::new(constraints.ideal_width, constraints.ideal_height),
            FrameFormat::MJPEG,
            constraints.ideal_frame_rate,
        );
        let requested = RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(format));

        let mut camera = Camera::new(index, requested).map_err(map_error)?;
        camera.open_stream().map_err(map_error)?;

        tracing::info!(
            "Camera opened: {} at {:?}",
            camera.info().human_name(),
            camera.resolution()
        );

        Ok(Box::new(NokhwaStream {
            camera,
            streaming: true,
        }))
    }
}

struct NokhwaStream {
    camera: Camera,
    streaming: bool,
}

impl NokhwaStream {
    fn zoom_range(&self) -> Option<ZoomRange> {
        let control = self.camera.camera_control(KnownCameraControl::Zoom).ok()?;
        match control.description() {
            ControlValueDescription::IntegerRange { min, max, step, .. } if max > min => {
                Some(ZoomRange {
                    min: *min as f32,
                    max: *max as f32,
                    step: (*step).max(1) as f32,
                })
            }
            _ => None,
        }
    }
}

impl CameraStream for NokhwaStream {
    fn label(&self) -> String {
        self.camera.info().human_name()
    }

    fn capabilities(&self) -> TrackCapabilities {
        let focus_modes = if self.camera.camera_control(KnownCameraControl::Focus).is_ok() {
            vec![FocusMode::Continuous, FocusMode::Manual]
        } else {
            vec![FocusMode::Fixed]
        };

        TrackCapabilities {
            zoom: self.zoom_range(),
            torch: false,
            focus_modes,
        }
    }

    fn track_count(&self) -> usize {
        usize::from(self.streaming)
    }

    fn grab(&mut self) -> Result<Option<RgbaImage>, CameraError> {
        if !self.streaming {
            return Ok(None);
        }

        let buffer = self.camera.frame().map_err(map_error)?;
        let decoded = buffer.decode_image::<RgbFormat>().map_err(map_error)?;

        let (width, height) = (decoded.width(), decoded.height());
        let Some(rgb) = image::RgbImage::from_raw(width, height, decoded.into_raw()) else {
            return Ok(None);
        };

        Ok(Some(FrameHandle::from_rgb(&rgb, 0, 0).into_rgba()))
    }

    fn set_zoom(&mut self, zoom: f32) -> Result<(), CameraError> {
        let range = self
            .zoom_range()
            .ok_or_else(|| CameraError::Backend("zoom not supported".into()))?;
        let value = zoom.clamp(range.min, range.max).round() as i64;
        self.camera
            .set_camera_control(KnownCameraControl::Zoom, ControlValueSetter::Integer(value))
            .map_err(map_error)
    }

    fn stop(&mut self) {
        if self.streaming {
            self.streaming = false;
            if let Err(e) = self.camera.stop_stream() {
                tracing::warn!("Error stopping camera stream: {}", e);
            }
        }
    }
}

impl Drop for NokhwaStream {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Classify a nokhwa error into the scanner taxonomy
fn map_error(err: NokhwaError) -> CameraError {
    let message = err.to_string();
    let lower = message.to_lowercase();

    if lower.contains("permission") || lower.contains("denied") || lower.contains("not authorized") {
        CameraError::PermissionDenied
    } else if lower.contains("busy") || lower.contains("in use") {
        CameraError::AlreadyInUse
    } else if lower.contains("no such device") || lower.contains("not found") {
        CameraError::NotFound
    } else {
        CameraError::Backend(message)
    }
}
