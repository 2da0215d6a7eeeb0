//! Scan controller
//!
//! Runs a `ScanLoop` on a dedicated thread and drives it with commands.
//! Camera streams are not `Send`, so the loop is built on that thread by a
//! factory closure and never leaves it.
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, Sender};

use super::scan_loop::{ScanLoop, SessionToken, TickOutcome};
use crate::messaging::{EventBus, ScanCommand, ScanEvent, SubscriberId};
use crate::zoom::ZoomGesture;

pub struct ScanController {
    commands: Sender<ScanCommand>,
    bus: EventBus,
    token: SessionToken,
    thread: Option<JoinHandle<()>>,
}

impl ScanController {
    /// Spawn the scan thread. Nothing is acquired until `start`.
    pub fn spawn<F>(factory: F) -> io::Result<Self>
    where
        F: FnOnce() -> ScanLoop + Send + 'static,
    {
        let (tx, rx) = unbounded();
        let bus = EventBus::new();
        let token = SessionToken::default();

        let thread_bus = bus.clone();
        let thread_token = token.clone();
        let thread = thread::Builder::new()
            .name("scan-loop".into())
            .spawn(move || {
                let scan = factory()
                    .with_event_bus(thread_bus)
                    .with_session_token(thread_token);
                run(scan, rx);
            })?;

        tracing::info!("✓ Scan thread started");
        Ok(Self {
            commands: tx,
            bus,
            token,
            thread: Some(thread),
        })
    }

    /// Subscribe to scanner events
    pub fn events(&self) -> (Receiver<ScanEvent>, SubscriberId) {
        self.bus.subscribe()
    }

    pub fn event_bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn start(&self) {
        self.send(ScanCommand::Start);
    }

    pub fn pause(&self) {
        self.send(ScanCommand::Pause);
    }

    pub fn resume(&self) {
        self.send(ScanCommand::Resume);
    }

    pub fn set_visible(&self, visible: bool) {
        self.send(ScanCommand::SetVisible(visible));
    }

    pub fn zoom(&self, gesture: ZoomGesture) {
        self.send(ScanCommand::Zoom(gesture));
    }

    pub fn torch(&self, on: bool) {
        self.send(ScanCommand::Torch(on));
    }

    /// Release the camera. Any tick already in flight has its result
    /// discarded.
    pub fn stop(&self) {
        self.token.invalidate();
        self.send(ScanCommand::Stop);
    }

    /// Stop scanning and wait for the scan thread to exit
    pub fn shutdown(&mut self) {
        self.token.invalidate();
        self.send(ScanCommand::Shutdown);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("Scan thread panicked");
            }
        }
    }

    fn send(&self, command: ScanCommand) {
        tracing::debug!("Command: {}", command.description());
        if self.commands.send(command).is_err() {
            tracing::warn!("Scan thread is gone; command dropped");
        }
    }
}

impl Drop for ScanController {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.shutdown();
        }
    }
}

/// Scan thread body: ticks on schedule, handles commands in between
fn run(mut scan: ScanLoop, commands: Receiver<ScanCommand>) {
    let mut next_tick: Option<Instant> = None;

    loop {
        if scan.next_delay().is_none() {
            next_tick = None;
        } else if next_tick.is_none() {
            next_tick = Some(Instant::now());
        }

        let received = match next_tick {
            Some(at) => commands.recv_deadline(at),
            None => commands.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };

        match received {
            Ok(ScanCommand::Shutdown) => break,
            Ok(command) => handle(&mut scan, command),
            Err(RecvTimeoutError::Timeout) => {
                if let TickOutcome::Failed(fault) = scan.tick() {
                    tracing::warn!("Scan loop halted: {}", fault);
                }
                next_tick = scan.next_delay().map(|delay| Instant::now() + delay);
            }
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }

    scan.stop();
    tracing::info!("Scan thread stopped");
}

fn handle(scan: &mut ScanLoop, command: ScanCommand) {
    match command {
        ScanCommand::Start => {
            // Failure is already published as CameraFailed
            let _ = scan.start();
        }
        ScanCommand::Pause => {
            if let Err(e) = scan.pause() {
                tracing::debug!("Pause ignored: {}", e);
            }
        }
        ScanCommand::Resume => {
            if let Err(e) = scan.resume() {
                tracing::debug!("Resume ignored: {}", e);
            }
        }
        ScanCommand::SetVisible(visible) => scan.set_visible(visible),
        ScanCommand::Zoom(gesture) => {
            if let Some(value) = scan.apply_zoom(gesture) {
                tracing::debug!("Zoom {:.2}x", value);
            }
        }
        ScanCommand::Torch(on) => {
            if let Err(e) = scan.set_torch(on) {
                tracing::warn!("Torch unavailable: {}", e);
            }
        }
        ScanCommand::Stop => scan.stop(),
        ScanCommand::Shutdown => {}
    }
}
