//! Shared fixtures for the integration tests

#![allow(dead_code)]

use image::{Rgba, RgbaImage};
use rxing::{BarcodeFormat as RxFormat, MultiFormatWriter, Writer};

use checkout_scanner::camera::{FrameFeed, FrameSource, StillBackend};
use checkout_scanner::clock::ManualClock;
use checkout_scanner::camera::FrameHandle;
use checkout_scanner::strategy::{build_strategies, PlatformBarcodeApi, PlatformCode};
use checkout_scanner::{BarcodeFormat, ScanLoop, ScannerConfig, StrategyArbiter, StrategyKind};

pub const QR_TEXT: &str = "8901030895146";
pub const EAN13_TEXT: &str = "4006381333931";
pub const START_MS: i64 = 1_700_000_000_000;

const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Draw a barcode onto a white canvas with a quiet margin
pub fn render(text: &str, format: RxFormat, width: i32, height: i32) -> RgbaImage {
    let matrix = MultiFormatWriter::default()
        .encode(text, &format, width, height)
        .expect("fixture encodes");

    let margin = 24;
    let (w, h) = (matrix.getWidth(), matrix.getHeight());
    let mut image = RgbaImage::from_pixel(w + 2 * margin, h + 2 * margin, WHITE);
    for y in 0..h {
        for x in 0..w {
            if matrix.get(x, y) {
                image.put_pixel(x + margin, y + margin, BLACK);
            }
        }
    }
    image
}

pub fn qr_frame() -> RgbaImage {
    render(QR_TEXT, RxFormat::QR_CODE, 240, 240)
}

pub fn ean13_frame() -> RgbaImage {
    render(EAN13_TEXT, RxFormat::EAN_13, 380, 140)
}

/// Smooth gradient with one flat block: no bars, no finder patterns
pub fn garbage_frame() -> RgbaImage {
    RgbaImage::from_fn(320, 240, |x, y| {
        if (100..180).contains(&x) && (60..140).contains(&y) {
            Rgba([90, 120, 150, 255])
        } else {
            let v = ((x + y) * 255 / (320 + 240)) as u8;
            Rgba([v, v / 2 + 64, 255 - v, 255])
        }
    })
}

pub fn test_config() -> ScannerConfig {
    let mut config = ScannerConfig::default();
    config.camera.retry_delay_ms = 0;
    config
}

/// QR-first policy so matrix codes never reach the 1-D reader
pub fn qr_first(mut config: ScannerConfig) -> ScannerConfig {
    config.strategy_order = vec![
        StrategyKind::Native,
        StrategyKind::Ml,
        StrategyKind::Qr,
        StrategyKind::Linear,
    ];
    config
}

pub struct Rig {
    pub scan: ScanLoop,
    pub feed: FrameFeed,
    pub clock: ManualClock,
}

/// Scan loop over still frames with the standard strategy set, no native
/// detector and no ML model
pub fn rig(config: ScannerConfig) -> Rig {
    let feed = FrameFeed::new();
    let clock = ManualClock::new(START_MS);
    let source = FrameSource::new(Box::new(StillBackend::new(feed.clone())));
    let arbiter = StrategyArbiter::new(build_strategies(&config, None, None), &config.strategy_order);
    let scan = ScanLoop::new(config, source, arbiter).with_clock(Box::new(clock.clone()));
    Rig { scan, feed, clock }
}

/// Platform detector that reports the same code for every frame
pub struct FixedPlatformCode(pub PlatformCode);

impl PlatformBarcodeApi for FixedPlatformCode {
    fn supported_formats(&self) -> Vec<BarcodeFormat> {
        vec![self.0.format]
    }

    fn detect(&mut self, _frame: &FrameHandle) -> Result<Vec<PlatformCode>, String> {
        Ok(vec![self.0.clone()])
    }
}

/// Like `rig`, with a platform detector in front of the other strategies
pub fn rig_with_platform(config: ScannerConfig, platform: Box<dyn PlatformBarcodeApi>) -> Rig {
    let feed = FrameFeed::new();
    let clock = ManualClock::new(START_MS);
    let source = FrameSource::new(Box::new(StillBackend::new(feed.clone())));
    let arbiter = StrategyArbiter::new(
        build_strategies(&config, Some(platform), None),
        &config.strategy_order,
    );
    let scan = ScanLoop::new(config, source, arbiter).with_clock(Box::new(clock.clone()));
    Rig { scan, feed, clock }
}
