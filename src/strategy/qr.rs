//! QR strategy
//!
//! Decodes QR matrix codes from the luma plane with rqrr. Tries, in order:
//! the frame as-is, the inverted frame (light-on-dark codes), and a
//! contrast-boosted frame for washed-out captures.
use image::GrayImage;

use super::{DecodeStrategy, InitProgress};
use crate::camera::FrameHandle;
use crate::error::{DecodeFrameError, StrategyInitError};
use crate::types::{BarcodeFormat, DecodeResult, StrategyKind};

/// Pixel transform applied before grid detection
#[derive(Debug, Clone, Copy, PartialEq)]
enum Pass {
    Normal,
    Inverted,
    Boosted(f32),
}

impl Pass {
    fn apply(self, value: u8) -> u8 {
        match self {
            Pass::Normal => value,
            Pass::Inverted => 255 - value,
            Pass::Boosted(gain) => (value as f32 * gain).min(255.0) as u8,
        }
    }
}

pub struct QrStrategy {
    try_inverted: bool,
    contrast_boost: f32,
}

impl QrStrategy {
    pub fn new(try_inverted: bool, contrast_boost: f32) -> Self {
        Self {
            try_inverted,
            contrast_boost,
        }
    }

    fn passes(&self) -> Vec<Pass> {
        let mut passes = vec![Pass::Normal];
        if self.try_inverted {
            passes.push(Pass::Inverted);
        }
        if self.contrast_boost > 1.0 {
            passes.push(Pass::Boosted(self.contrast_boost));
        }
        passes
    }

    fn decode_pass(luma: &GrayImage, pass: Pass) -> Option<String> {
        let (width, height) = luma.dimensions();
        let mut prepared = rqrr::PreparedImage::prepare_from_greyscale(
            width as usize,
            height as usize,
            |x, y| pass.apply(luma.get_pixel(x as u32, y as u32)[0]),
        );

        let grids = prepared.detect_grids();
        for grid in grids {
            match grid.decode() {
                Ok((_meta, content)) => return Some(content),
                Err(e) => tracing::debug!("QR grid decode failed ({:?}): {:?}", pass, e),
            }
        }
        None
    }
}

impl Default for QrStrategy {
    fn default() -> Self {
        Self::new(true, 1.3)
    }
}

impl DecodeStrategy for QrStrategy {
    fn name(&self) -> &'static str {
        "qr"
    }

    fn kind(&self) -> StrategyKind {
        StrategyKind::Qr
    }

    fn initialize(&mut self) -> Result<InitProgress, StrategyInitError> {
        tracing::info!(
            "✓ QR decoder ready (inverted: {}, contrast boost: {})",
            self.try_inverted,
            self.contrast_boost
        );
        Ok(InitProgress::Ready)
    }

    fn detect(&mut self, frame: &FrameHandle) -> Result<Option<DecodeResult>, DecodeFrameError> {
        if frame.is_empty() {
            return Ok(None);
        }

        let luma = frame.luma();
        for pass in self.passes() {
            if let Some(text) = Self::decode_pass(&luma, pass) {
                if text.is_empty() {
                    continue;
                }
                return Ok(Some(DecodeResult::new(text, BarcodeFormat::Qr, "qr")));
            }
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    #[test]
    fn test_pass_transforms() {
        assert_eq!(Pass::Normal.apply(40), 40);
        assert_eq!(Pass::Inverted.apply(40), 215);
        assert_eq!(Pass::Boosted(1.3).apply(100), 130);
        assert_eq!(Pass::Boosted(1.3).apply(250), 255);
    }

    #[test]
    fn test_pass_selection() {
        assert_eq!(QrStrategy::new(false, 0.0).passes(), vec![Pass::Normal]);
        assert_eq!(
            QrStrategy::new(true, 1.3).passes(),
            vec![Pass::Normal, Pass::Inverted, Pass::Boosted(1.3)]
        );
    }

    #[test]
    fn test_noise_frame_yields_nothing() {
        let mut image = RgbaImage::new(64, 64);
        for (x, y, pixel) in image.enumerate_pixels_mut() {
            let v = if (x / 3 + y / 5) % 2 == 0 { 30 } else { 220 };
            *pixel = Rgba([v, v, v, 255]);
        }
        let mut strategy = QrStrategy::default();
        strategy.initialize().unwrap();
        assert_eq!(strategy.detect(&FrameHandle::new(image, 0, 1)).unwrap(), None);
    }
}
