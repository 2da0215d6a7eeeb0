//! Scan loop
//!
//! One `tick` pulls one frame, runs the arbiter, validates and debounces the
//! result, and reports it. Ticks never overlap: the caller (normally the
//! `ScanController` thread) runs the next tick only after the previous one
//! returned, waiting `next_delay()` in between.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use crate::arbiter::StrategyArbiter;
use crate::camera::FrameSource;
use crate::clock::{Clock, SystemClock};
use crate::config::ScannerConfig;
use crate::debounce::DetectionDebouncer;
use crate::error::{CameraError, TransitionError};
use crate::messaging::{EventBus, ScanEvent};
use crate::types::DetectionEvent;
use crate::validate::{BasicValidator, PayloadValidator};
use crate::zoom::{ZoomController, ZoomGesture, ZoomTarget};

use super::state::{ScanFault, ScanState, ScanStateMachine};
use super::stats::{ScanStats, TickTiming};

pub type DetectionCallback = Box<dyn FnMut(&DetectionEvent) + Send>;

/// Session generation shared between the scan thread and its controller.
///
/// Bumped on every start and stop; a tick that observes a different
/// generation than the one it started with discards its result.
#[derive(Debug, Clone, Default)]
pub struct SessionToken(Arc<AtomicU64>);

impl SessionToken {
    pub fn current(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    /// Invalidate the current session, returning the new generation
    pub fn invalidate(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }
}

/// What a single tick did
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// Not in a polling state
    Inactive,
    /// Camera has not produced a frame yet
    WaitingForFrame,
    /// Frame available but every strategy is still loading
    WaitingForStrategies,
    NoDetection,
    /// Decoded, but the same code was reported within the cooldown window
    Suppressed,
    /// Decoded, but the payload failed validation
    Rejected,
    Detected(DetectionEvent),
    /// Session was stopped while the tick was in flight
    Stale,
    Failed(ScanFault),
}

pub struct ScanLoop {
    config: ScannerConfig,
    source: FrameSource,
    arbiter: StrategyArbiter,
    debouncer: DetectionDebouncer,
    validator: Box<dyn PayloadValidator>,
    clock: Box<dyn Clock>,
    bus: EventBus,
    on_detection: Option<DetectionCallback>,
    zoom: ZoomController,
    stats: ScanStats,
    machine: ScanStateMachine,
    token: SessionToken,
    generation: u64,
    visible: bool,
    /// Last tick emitted a detection; next delay is the success pause
    cooling_down: bool,
}

impl ScanLoop {
    pub fn new(config: ScannerConfig, source: FrameSource, arbiter: StrategyArbiter) -> Self {
        Self {
            debouncer: DetectionDebouncer::new(config.cooldown_ms, config.cooldown_capacity),
            zoom: ZoomController::new(&config.zoom),
            config,
            source,
            arbiter,
            validator: Box::new(BasicValidator),
            clock: Box::new(SystemClock),
            bus: EventBus::new(),
            on_detection: None,
            stats: ScanStats::new(),
            machine: ScanStateMachine::new(),
            token: SessionToken::default(),
            generation: 0,
            visible: true,
            cooling_down: false,
        }
    }

    pub fn with_validator(mut self, validator: Box<dyn PayloadValidator>) -> Self {
        self.validator = validator;
        self
    }

    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Publish on an existing bus instead of a private one
    pub fn with_event_bus(mut self, bus: EventBus) -> Self {
        self.bus = bus;
        self
    }

    /// Share the session generation with a controller on another thread
    pub fn with_session_token(mut self, token: SessionToken) -> Self {
        self.generation = token.current();
        self.token = token;
        self
    }

    /// Plain callback invoked for every emitted detection
    pub fn on_detection(&mut self, callback: impl FnMut(&DetectionEvent) + Send + 'static) {
        self.on_detection = Some(Box::new(callback));
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn session_token(&self) -> SessionToken {
        self.token.clone()
    }

    pub fn state(&self) -> &ScanState {
        self.machine.state()
    }

    pub fn stats(&self) -> &ScanStats {
        &self.stats
    }

    pub fn arbiter(&self) -> &StrategyArbiter {
        &self.arbiter
    }

    pub fn frame_source(&self) -> &FrameSource {
        &self.source
    }

    pub fn zoom(&self) -> &ZoomController {
        &self.zoom
    }

    /// Acquire the camera and initialize strategies.
    ///
    /// An active session is fully stopped first. Camera errors are returned
    /// (and published); running out of strategies moves to the error state.
    pub fn start(&mut self) -> Result<(), CameraError> {
        if self.machine.state().is_active() {
            tracing::info!("Restarting active scan session");
            self.stop();
        }

        let old = self.machine.state().clone();
        if let Err(e) = self.machine.start() {
            tracing::warn!("Cannot start scanner: {}", e);
            return Ok(());
        }
        self.generation = self.token.invalidate();
        self.debouncer.clear();
        self.cooling_down = false;
        self.publish_transition(old);

        let now = self.clock.now_ms();
        let capabilities = match self.source.start(&self.config.camera, now) {
            Ok(session) => session.capabilities().clone(),
            Err(e) => {
                self.fail(ScanFault::Camera(e.clone()));
                return Err(e);
            }
        };
        self.zoom.attach(&capabilities);

        self.arbiter.initialize();
        self.publish_strategy_changes();
        if self.arbiter.all_exhausted() {
            self.fail(ScanFault::NoStrategies);
        }
        Ok(())
    }

    /// Running → Paused. Camera stays acquired.
    pub fn pause(&mut self) -> Result<(), TransitionError> {
        let old = self.machine.state().clone();
        self.machine.pause()?;
        self.cooling_down = false;
        self.publish_transition(old);
        Ok(())
    }

    /// Paused → Running
    pub fn resume(&mut self) -> Result<(), TransitionError> {
        let old = self.machine.state().clone();
        self.machine.resume(self.clock.now_ms())?;
        self.publish_transition(old);
        Ok(())
    }

    /// Page visibility: hiding pauses a running loop, showing resumes it
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        let result = match (visible, self.machine.state()) {
            (false, ScanState::Running { .. }) => self.pause(),
            (true, ScanState::Paused) => self.resume(),
            _ => Ok(()),
        };
        if let Err(e) = result {
            tracing::debug!("Visibility change ignored: {}", e);
        }
    }

    /// Release the camera and end the session. Idempotent.
    pub fn stop(&mut self) {
        self.token.invalidate();
        let old = self.machine.state().clone();
        let stopped = self.machine.stop();
        self.source.stop();
        self.cooling_down = false;

        if stopped {
            self.publish_transition(old);
            self.stats.log_report();
            self.stats.reset();
        }
    }

    /// Apply a zoom gesture; returns the new zoom factor if it changed
    pub fn apply_zoom(&mut self, gesture: ZoomGesture) -> Option<f32> {
        let value = self.zoom.apply(gesture)?;
        if self.zoom.target() == ZoomTarget::Hardware {
            if let Err(e) = self.source.set_zoom(value) {
                tracing::warn!("Hardware zoom rejected ({}), cropping instead", e);
                self.zoom.use_software();
            }
        }
        Some(self.zoom.current())
    }

    pub fn set_torch(&mut self, on: bool) -> Result<(), CameraError> {
        self.source.set_torch(on)
    }

    /// Delay before the next tick, `None` when the loop should not tick
    pub fn next_delay(&self) -> Option<std::time::Duration> {
        if !self.machine.state().wants_ticks() {
            return None;
        }
        let ms = if self.cooling_down {
            self.config.success_pause_ms
        } else {
            self.config.tick_interval_ms
        };
        Some(std::time::Duration::from_millis(ms))
    }

    /// Process one frame
    pub fn tick(&mut self) -> TickOutcome {
        if !self.machine.state().wants_ticks() {
            return TickOutcome::Inactive;
        }
        if self.token.current() != self.generation {
            return TickOutcome::Stale;
        }

        self.cooling_down = false;
        let tick_start = Instant::now();
        let now = self.clock.now_ms();

        let frame = match self.source.current_frame(now) {
            Ok(Some(frame)) => frame,
            Ok(None) => return TickOutcome::WaitingForFrame,
            Err(e) => return self.fail(ScanFault::Camera(e)),
        };
        let frame_us = tick_start.elapsed().as_secs_f64() * 1_000_000.0;

        let factor = self.zoom.software_factor();
        let frame = if factor > 1.0 { frame.zoomed(factor) } else { frame };

        let decode_start = Instant::now();
        let decoded = self.arbiter.arbitrate(&frame);
        let decode_us = decode_start.elapsed().as_secs_f64() * 1_000_000.0;
        self.publish_strategy_changes();

        if self.token.current() != self.generation {
            tracing::debug!("Discarding result from a stopped session");
            return TickOutcome::Stale;
        }

        if *self.machine.state() == ScanState::Starting {
            if let Some(outcome) = self.settle_starting(now) {
                return outcome;
            }
        }

        self.stats.add(TickTiming {
            frame_us,
            decode_us,
            total_us: tick_start.elapsed().as_secs_f64() * 1_000_000.0,
        });

        let Some(result) = decoded else {
            return TickOutcome::NoDetection;
        };
        self.stats.record_hit(result.strategy_used);

        if let Err(e) = self.validator.validate(&result) {
            tracing::debug!("{}", e);
            self.stats.record_rejected();
            return TickOutcome::Rejected;
        }

        if !self.debouncer.should_emit(&result.text, now) {
            self.stats.record_suppressed();
            return TickOutcome::Suppressed;
        }

        let event = DetectionEvent {
            result,
            timestamp: now,
        };
        tracing::info!(
            "✓ Detected {} ({}, via {})",
            event.result.text,
            event.result.format,
            event.result.strategy_used
        );
        self.stats.record_emitted();
        self.cooling_down = true;

        if let Some(callback) = self.on_detection.as_mut() {
            callback(&event);
        }
        self.bus.publish(ScanEvent::Detected(event.clone()));
        TickOutcome::Detected(event)
    }

    /// Starting → Running once a strategy is ready, or → Error if none can be.
    /// Returns an outcome when the tick should end here.
    fn settle_starting(&mut self, now: i64) -> Option<TickOutcome> {
        if self.arbiter.has_ready() {
            let old = self.machine.state().clone();
            if self.machine.mark_running(now).is_ok() {
                self.publish_transition(old);
            }
            if !self.visible {
                self.set_visible(false);
                return Some(TickOutcome::Inactive);
            }
            None
        } else if self.arbiter.all_exhausted() {
            Some(self.fail(ScanFault::NoStrategies))
        } else {
            Some(TickOutcome::WaitingForStrategies)
        }
    }

    fn fail(&mut self, fault: ScanFault) -> TickOutcome {
        let old = self.machine.state().clone();
        self.source.stop();

        match &fault {
            ScanFault::Camera(error) => {
                tracing::error!("Camera failed: {} ({})", error, error.user_hint());
                self.bus.publish(ScanEvent::CameraFailed {
                    error: error.clone(),
                    retryable: error.is_retryable(),
                });
            }
            ScanFault::NoStrategies => tracing::error!("No decode strategy is available"),
        }

        if self.machine.fail(fault.clone()).is_ok() {
            self.publish_transition(old);
        }
        TickOutcome::Failed(fault)
    }

    fn publish_transition(&self, old: ScanState) {
        let new = self.machine.state().clone();
        if new != old {
            tracing::info!("Scanner: {} → {}", old.description(), new.description());
            self.bus.publish(ScanEvent::StateChanged { old, new });
        }
    }

    fn publish_strategy_changes(&mut self) {
        for (name, state) in self.arbiter.drain_changes() {
            self.bus.publish(ScanEvent::StrategyStateChanged { name, state });
        }
    }
}

impl Drop for ScanLoop {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{CameraBackend, CameraConstraints, CameraStream, TrackCapabilities};
    use crate::clock::ManualClock;
    use crate::error::{DecodeFrameError, StrategyInitError};
    use crate::strategy::{DecodeStrategy, InitProgress};
    use crate::types::{BarcodeFormat, DecodeResult, StrategyKind};
    use crate::camera::FrameHandle;
    use image::RgbaImage;
    use parking_lot::Mutex;

    struct StillStream;

    impl CameraStream for StillStream {
        fn label(&self) -> String {
            "still".into()
        }
        fn capabilities(&self) -> TrackCapabilities {
            TrackCapabilities::default()
        }
        fn track_count(&self) -> usize {
            1
        }
        fn grab(&mut self) -> Result<Option<RgbaImage>, CameraError> {
            Ok(Some(RgbaImage::new(8, 8)))
        }
        fn stop(&mut self) {}
    }

    struct StillBackend {
        fail_with: Option<CameraError>,
    }

    impl CameraBackend for StillBackend {
        fn open(&mut self, _c: &CameraConstraints) -> Result<Box<dyn CameraStream>, CameraError> {
            match &self.fail_with {
                Some(e) => Err(e.clone()),
                None => Ok(Box::new(StillStream)),
            }
        }
    }

    /// Always decodes the same text
    struct Echo {
        text: Option<&'static str>,
        init: Result<InitProgress, StrategyInitError>,
    }

    impl DecodeStrategy for Echo {
        fn name(&self) -> &'static str {
            "echo"
        }
        fn kind(&self) -> StrategyKind {
            StrategyKind::Qr
        }
        fn initialize(&mut self) -> Result<InitProgress, StrategyInitError> {
            self.init.clone()
        }
        fn poll_initialized(&mut self) -> Result<InitProgress, StrategyInitError> {
            Ok(InitProgress::Pending)
        }
        fn detect(&mut self, _f: &FrameHandle) -> Result<Option<DecodeResult>, DecodeFrameError> {
            Ok(self.text.map(|t| DecodeResult::new(t, BarcodeFormat::Qr, "echo")))
        }
    }

    fn scan_loop(
        text: Option<&'static str>,
        init: Result<InitProgress, StrategyInitError>,
        fail_with: Option<CameraError>,
    ) -> (ScanLoop, ManualClock) {
        let mut config = ScannerConfig::default();
        config.camera.retry_delay_ms = 0;
        let clock = ManualClock::new(1_000_000);
        let source = FrameSource::new(Box::new(StillBackend { fail_with }));
        let arbiter = StrategyArbiter::new(vec![Box::new(Echo { text, init })], &config.strategy_order);
        let scan = ScanLoop::new(config, source, arbiter).with_clock(Box::new(clock.clone()));
        (scan, clock)
    }

    #[test]
    fn test_start_then_detect_and_cool_down() {
        let (mut scan, clock) = scan_loop(Some("CHK-0042"), Ok(InitProgress::Ready), None);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        scan.on_detection(move |event| sink.lock().push(event.text().to_string()));

        scan.start().unwrap();
        assert_eq!(scan.state(), &ScanState::Starting);

        assert!(matches!(scan.tick(), TickOutcome::Detected(_)));
        assert!(scan.state().is_running());
        assert_eq!(scan.next_delay(), Some(std::time::Duration::from_millis(2_000)));

        clock.advance(500);
        assert_eq!(scan.tick(), TickOutcome::Suppressed);
        assert_eq!(scan.next_delay(), Some(std::time::Duration::from_millis(100)));

        clock.advance(2_500);
        assert!(matches!(scan.tick(), TickOutcome::Detected(_)));
        assert_eq!(*seen.lock(), vec!["CHK-0042", "CHK-0042"]);
    }

    #[test]
    fn test_pause_stops_ticking() {
        let (mut scan, _clock) = scan_loop(None, Ok(InitProgress::Ready), None);
        scan.start().unwrap();
        assert_eq!(scan.tick(), TickOutcome::NoDetection);

        scan.set_visible(false);
        assert_eq!(scan.state(), &ScanState::Paused);
        assert_eq!(scan.tick(), TickOutcome::Inactive);
        assert_eq!(scan.next_delay(), None);
        assert!(scan.frame_source().is_active());

        scan.set_visible(true);
        assert!(scan.state().is_running());
        assert_eq!(scan.tick(), TickOutcome::NoDetection);
    }

    #[test]
    fn test_camera_error_is_surfaced() {
        let (mut scan, _clock) = scan_loop(None, Ok(InitProgress::Ready), Some(CameraError::PermissionDenied));
        let (rx, _id) = scan.event_bus().subscribe();

        assert_eq!(scan.start(), Err(CameraError::PermissionDenied));
        assert_eq!(
            scan.state(),
            &ScanState::Error(ScanFault::Camera(CameraError::PermissionDenied))
        );
        let failed = rx.try_iter().any(|e| {
            matches!(
                e,
                ScanEvent::CameraFailed {
                    error: CameraError::PermissionDenied,
                    retryable: false
                }
            )
        });
        assert!(failed);
    }

    #[test]
    fn test_no_strategies_is_an_error_state() {
        let (mut scan, _clock) = scan_loop(
            None,
            Err(StrategyInitError::Unavailable("none".into())),
            None,
        );
        scan.start().unwrap();
        assert_eq!(scan.state(), &ScanState::Error(ScanFault::NoStrategies));
        assert!(!scan.frame_source().is_active());
    }

    #[test]
    fn test_loading_strategy_keeps_starting() {
        let (mut scan, _clock) = scan_loop(Some("x"), Ok(InitProgress::Pending), None);
        scan.start().unwrap();
        assert_eq!(scan.tick(), TickOutcome::WaitingForStrategies);
        assert_eq!(scan.state(), &ScanState::Starting);
    }

    #[test]
    fn test_invalidated_session_discards_tick() {
        let (mut scan, _clock) = scan_loop(Some("late"), Ok(InitProgress::Ready), None);
        scan.start().unwrap();
        scan.session_token().invalidate();
        assert_eq!(scan.tick(), TickOutcome::Stale);
        assert_eq!(scan.stats().emitted(), 0);
    }

    #[test]
    fn test_stop_is_idempotent() {
        let (mut scan, _clock) = scan_loop(None, Ok(InitProgress::Ready), None);
        scan.stop();
        scan.start().unwrap();
        scan.stop();
        scan.stop();
        assert_eq!(scan.state(), &ScanState::Stopped);
        assert!(!scan.frame_source().is_active());
    }

    #[test]
    fn test_software_zoom_without_hardware_range() {
        let (mut scan, _clock) = scan_loop(None, Ok(InitProgress::Ready), None);
        scan.start().unwrap();
        assert_eq!(scan.apply_zoom(ZoomGesture::Set(2.0)), Some(2.0));
        assert_eq!(scan.zoom().software_factor(), 2.0);
        assert_eq!(scan.tick(), TickOutcome::NoDetection);
    }
}
