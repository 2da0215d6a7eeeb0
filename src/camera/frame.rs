//! Per-tick frame handle
//!
//! A `FrameHandle` is produced once per polling tick and dropped after the
//! tick; strategies never keep one across ticks.
use image::{imageops, GrayImage, RgbImage, RgbaImage};
use rayon::prelude::*;

#[derive(Debug, Clone)]
pub struct FrameHandle {
    image: RgbaImage,
    captured_at: i64,
    sequence: u64,
}

impl FrameHandle {
    pub fn new(image: RgbaImage, captured_at: i64, sequence: u64) -> Self {
        Self {
            image,
            captured_at,
            sequence,
        }
    }

    /// Build from a packed RGB buffer (what most webcams hand out)
    pub fn from_rgb(rgb: &RgbImage, captured_at: i64, sequence: u64) -> Self {
        let (width, height) = rgb.dimensions();
        let mut pixels = vec![255u8; (width as usize) * (height as usize) * 4];
        pixels
            .par_chunks_exact_mut(4)
            .zip(rgb.as_raw().par_chunks_exact(3))
            .for_each(|(dst, src)| {
                dst[..3].copy_from_slice(src);
            });

        let image = RgbaImage::from_raw(width, height, pixels)
            .unwrap_or_else(|| RgbaImage::new(width, height));
        Self::new(image, captured_at, sequence)
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }

    /// Capture time in ms since epoch
    pub fn captured_at(&self) -> i64 {
        self.captured_at
    }

    /// Monotonic frame number within the session
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn rgba(&self) -> &RgbaImage {
        &self.image
    }

    pub fn into_rgba(self) -> RgbaImage {
        self.image
    }

    /// Luminance plane, Y = 0.299 R + 0.587 G + 0.114 B
    ///
    /// Integer arithmetic, split across the rayon pool.
    pub fn luma(&self) -> GrayImage {
        let (width, height) = self.image.dimensions();
        let mut out = vec![0u8; (width as usize) * (height as usize)];
        out.par_iter_mut()
            .zip(self.image.as_raw().par_chunks_exact(4))
            .for_each(|(dst, px)| {
                let y = (px[0] as u32 * 299 + px[1] as u32 * 587 + px[2] as u32 * 114) / 1000;
                *dst = y as u8;
            });

        GrayImage::from_raw(width, height, out).unwrap_or_else(|| GrayImage::new(width, height))
    }

    /// Software zoom: center crop by `factor` (1.0 = full frame)
    pub fn zoomed(&self, factor: f32) -> FrameHandle {
        if !(factor > 1.0) || self.is_empty() {
            return self.clone();
        }

        let (width, height) = self.image.dimensions();
        let crop_w = ((width as f32 / factor).round() as u32).clamp(1, width);
        let crop_h = ((height as f32 / factor).round() as u32).clamp(1, height);
        let x = (width - crop_w) / 2;
        let y = (height - crop_h) / 2;

        let cropped = imageops::crop_imm(&self.image, x, y, crop_w, crop_h).to_image();
        FrameHandle::new(cropped, self.captured_at, self.sequence)
    }
}
