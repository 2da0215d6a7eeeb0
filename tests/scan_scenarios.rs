// End-to-end scanner scenarios: still frames in, detection events out.

mod common;

use std::time::{Duration, Instant};

use checkout_scanner::camera::{FrameSource, StillBackend, TrackCapabilities, ZoomRange};
use checkout_scanner::scan::ScanController;
use checkout_scanner::strategy::{build_strategies, PlatformCode};
use checkout_scanner::zoom::{ZoomGesture, ZoomTarget};
use checkout_scanner::{
    BarcodeFormat, CameraError, RetailCodeValidator, ScanEvent, ScanFault, ScanLoop, ScanState,
    StrategyArbiter, StrategyState, TickOutcome,
};
use common::*;
use rxing::BarcodeFormat as RxFormat;

fn detected_texts(rx: &crossbeam_channel::Receiver<ScanEvent>) -> Vec<String> {
    rx.try_iter()
        .filter_map(|e| e.detected_text().map(str::to_string))
        .collect()
}

#[test]
fn qr_code_is_reported_once_per_cooldown_window() {
    let Rig {
        mut scan,
        feed,
        clock,
    } = rig(qr_first(test_config()));
    let (rx, _id) = scan.event_bus().subscribe();
    scan.start().unwrap();

    feed.push(qr_frame());
    match scan.tick() {
        TickOutcome::Detected(event) => {
            assert_eq!(event.text(), QR_TEXT);
            assert_eq!(event.result.format, BarcodeFormat::Qr);
            assert_eq!(event.result.strategy_used, "qr");
            assert_eq!(event.timestamp, START_MS);
        }
        other => panic!("expected a detection, got {:?}", other),
    }

    clock.set(START_MS + 500);
    feed.push(qr_frame());
    assert_eq!(scan.tick(), TickOutcome::Suppressed);

    clock.set(START_MS + 3_000);
    feed.push(qr_frame());
    assert!(matches!(scan.tick(), TickOutcome::Detected(_)));

    assert_eq!(detected_texts(&rx), vec![QR_TEXT, QR_TEXT]);
}

#[test]
fn multiline_qr_payload_is_reported() {
    let Rig {
        mut scan, feed, ..
    } = rig(qr_first(test_config()));
    let (rx, _id) = scan.event_bus().subscribe();
    scan.start().unwrap();

    let payload = "ITEM-1\nQTY-2";
    feed.push(render(payload, RxFormat::QR_CODE, 240, 240));
    match scan.tick() {
        TickOutcome::Detected(event) => assert_eq!(event.text(), payload),
        other => panic!("expected a detection, got {:?}", other),
    }
    assert_eq!(detected_texts(&rx), vec![payload]);
}

#[test]
fn retail_code_with_bad_check_digit_is_rejected() {
    let misread = PlatformCode {
        raw_value: "4006381333932".into(),
        format: BarcodeFormat::Ean13,
    };
    let Rig {
        scan, feed, clock,
    } = rig_with_platform(test_config(), Box::new(FixedPlatformCode(misread)));
    let mut scan = scan.with_validator(Box::new(RetailCodeValidator::new()));
    let (rx, _id) = scan.event_bus().subscribe();
    scan.start().unwrap();

    for _ in 0..3 {
        feed.push(garbage_frame());
        assert_eq!(scan.tick(), TickOutcome::Rejected);
        assert!(scan.state().is_running());
        clock.advance(100);
    }

    assert!(detected_texts(&rx).is_empty());
    assert_eq!(scan.stats().rejected(), 3);
    assert_eq!(scan.stats().emitted(), 0);
    assert_eq!(scan.next_delay(), Some(std::time::Duration::from_millis(test_config().tick_interval_ms)));
}

#[test]
fn garbage_frames_never_emit_and_loop_keeps_running() {
    let Rig {
        mut scan,
        feed,
        clock,
    } = rig(test_config());
    let (rx, _id) = scan.event_bus().subscribe();
    scan.start().unwrap();

    for _ in 0..5 {
        feed.push(garbage_frame());
        assert_eq!(scan.tick(), TickOutcome::NoDetection);
        assert!(scan.state().is_running());
        clock.advance(100);
    }

    assert!(detected_texts(&rx).is_empty());
    assert_eq!(scan.stats().ticks(), 5);
}

#[test]
fn linear_code_is_found_when_native_detector_is_absent() {
    let Rig {
        mut scan, feed, ..
    } = rig(test_config());
    scan.start().unwrap();
    assert_eq!(scan.arbiter().states()[0], ("native", StrategyState::Unavailable));

    feed.push(ean13_frame());
    match scan.tick() {
        TickOutcome::Detected(event) => {
            assert_eq!(event.text(), EAN13_TEXT);
            assert_eq!(event.result.format, BarcodeFormat::Ean13);
            assert_eq!(event.result.strategy_used, "linear");
        }
        other => panic!("expected a detection, got {:?}", other),
    }
    assert_eq!(scan.stats().hits("native"), 0);
}

#[test]
fn stop_twice_is_a_no_op() {
    let Rig {
        mut scan, feed, ..
    } = rig(test_config());
    scan.stop();
    assert_eq!(scan.state(), &ScanState::Idle);

    scan.start().unwrap();
    assert_eq!(feed.live_tracks(), 1);

    scan.stop();
    scan.stop();
    assert_eq!(scan.state(), &ScanState::Stopped);
    assert_eq!(feed.live_tracks(), 0);
    assert_eq!(scan.tick(), TickOutcome::Inactive);
}

#[test]
fn restart_releases_previous_camera_first() {
    let Rig {
        mut scan, feed, ..
    } = rig(test_config());
    let (rx, _id) = scan.event_bus().subscribe();

    scan.start().unwrap();
    feed.push(garbage_frame());
    scan.tick();
    assert!(scan.state().is_running());

    scan.start().unwrap();
    assert_eq!(feed.opened(), 2);
    assert_eq!(feed.live_tracks(), 1);
    assert_eq!(scan.frame_source().session().map(|s| s.track_count()), Some(1));
    assert_eq!(scan.state(), &ScanState::Starting);

    let went_through_stopped = rx.try_iter().any(|e| {
        matches!(
            e,
            ScanEvent::StateChanged {
                new: ScanState::Stopped,
                ..
            }
        )
    });
    assert!(went_through_stopped);
}

#[test]
fn permission_denied_is_surfaced_without_retry() {
    let Rig {
        mut scan, feed, ..
    } = rig(test_config());
    let (rx, _id) = scan.event_bus().subscribe();
    feed.fail_next_open(CameraError::PermissionDenied);

    assert_eq!(scan.start(), Err(CameraError::PermissionDenied));
    assert_eq!(feed.opened(), 0);
    assert_eq!(
        scan.state(),
        &ScanState::Error(ScanFault::Camera(CameraError::PermissionDenied))
    );
    assert!(rx.try_iter().any(|e| matches!(
        e,
        ScanEvent::CameraFailed {
            error: CameraError::PermissionDenied,
            retryable: false
        }
    )));

    // User granted access and retried
    scan.start().unwrap();
    assert_eq!(scan.state(), &ScanState::Starting);
}

#[test]
fn busy_camera_is_retried() {
    let Rig {
        mut scan, feed, ..
    } = rig(test_config());
    feed.fail_next_open(CameraError::AlreadyInUse);
    feed.fail_next_open(CameraError::AlreadyInUse);

    scan.start().unwrap();
    assert_eq!(feed.opened(), 1);
    assert_eq!(feed.live_tracks(), 1);
}

#[test]
fn camera_without_frames_times_out() {
    let Rig {
        mut scan, clock, ..
    } = rig(test_config());
    scan.start().unwrap();

    assert_eq!(scan.tick(), TickOutcome::WaitingForFrame);
    clock.advance(10_000);
    assert_eq!(
        scan.tick(),
        TickOutcome::Failed(ScanFault::Camera(CameraError::Timeout))
    );
    assert!(!scan.frame_source().is_active());
}

#[test]
fn hidden_page_pauses_without_releasing_camera() {
    let Rig {
        mut scan, feed, ..
    } = rig(test_config());
    scan.start().unwrap();
    feed.push(garbage_frame());
    scan.tick();

    scan.set_visible(false);
    assert_eq!(scan.state(), &ScanState::Paused);
    assert_eq!(scan.next_delay(), None);
    assert_eq!(feed.live_tracks(), 1);

    scan.set_visible(true);
    assert!(scan.state().is_running());
}

#[test]
fn hardware_zoom_is_used_when_the_track_supports_it() {
    let config = test_config();
    let feed = checkout_scanner::camera::FrameFeed::new();
    let backend = StillBackend::new(feed.clone()).with_capabilities(TrackCapabilities {
        zoom: Some(ZoomRange {
            min: 1.0,
            max: 8.0,
            step: 0.5,
        }),
        ..Default::default()
    });
    let arbiter = StrategyArbiter::new(build_strategies(&config, None, None), &config.strategy_order);
    let mut scan = ScanLoop::new(config, FrameSource::new(Box::new(backend)), arbiter);
    scan.start().unwrap();

    scan.apply_zoom(ZoomGesture::PinchBegin { distance: 100.0 });
    assert_eq!(scan.apply_zoom(ZoomGesture::PinchUpdate { distance: 250.0 }), Some(2.5));
    assert_eq!(scan.zoom().target(), ZoomTarget::Hardware);
    assert_eq!(scan.zoom().software_factor(), 1.0);
}

#[test]
fn controller_delivers_detections_from_its_thread() {
    let feed = checkout_scanner::camera::FrameFeed::new();
    for _ in 0..3 {
        feed.push(qr_frame());
    }

    let thread_feed = feed.clone();
    let mut controller = ScanController::spawn(move || {
        let mut config = qr_first(test_config());
        config.tick_interval_ms = 10;
        let source = FrameSource::new(Box::new(StillBackend::new(thread_feed)));
        let arbiter =
            StrategyArbiter::new(build_strategies(&config, None, None), &config.strategy_order);
        ScanLoop::new(config, source, arbiter)
    })
    .unwrap();
    let (rx, _id) = controller.events();
    controller.start();

    let deadline = Instant::now() + Duration::from_secs(10);
    let mut detections = Vec::new();
    while let Ok(event) = rx.recv_deadline(deadline) {
        if let Some(text) = event.detected_text() {
            detections.push(text.to_string());
            break;
        }
    }
    assert_eq!(detections, vec![QR_TEXT]);

    controller.stop();
    controller.shutdown();
    assert_eq!(feed.live_tracks(), 0);
}
