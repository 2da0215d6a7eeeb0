use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use checkout_scanner::camera::{FrameFeed, FrameSource, StillBackend};
use checkout_scanner::clock::ManualClock;
use checkout_scanner::strategy::build_strategies;
use checkout_scanner::{
    RetailCodeValidator, ScanLoop, ScannerConfig, StrategyArbiter, TickOutcome,
};

/// Barcode scanner for the self-checkout kiosk
#[derive(Parser, Debug)]
#[command(name = "checkout-scanner", version, about)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode still images as consecutive camera frames
    Decode {
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },

    /// Scan from a live camera until `q` is entered
    #[cfg(feature = "camera")]
    Camera {
        /// Camera index (overrides facing preference)
        #[arg(long)]
        device: Option<u32>,
    },

    /// Write the default configuration file
    InitConfig,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = initialize_tracing();

    match cli.command {
        Command::InitConfig => {
            let path = match &cli.config {
                Some(path) => path.clone(),
                None => ScannerConfig::config_path()?,
            };
            ScannerConfig::default()
                .save_to(&path)
                .with_context(|| format!("writing {}", path.display()))?;
            println!("✓ Wrote default config to {}", path.display());
            Ok(())
        }
        Command::Decode { images } => {
            let config = load_config(cli.config.as_deref())?;
            decode_images(config, &images)
        }
        #[cfg(feature = "camera")]
        Command::Camera { device } => {
            let mut config = load_config(cli.config.as_deref())?;
            if device.is_some() {
                config.camera.device_index = device;
            }
            live::run(config)
        }
    }
}

fn load_config(path: Option<&std::path::Path>) -> Result<ScannerConfig> {
    let config = match path {
        Some(path) => ScannerConfig::load_from(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => ScannerConfig::load().context("loading config")?,
    };
    if config.ml.enabled {
        tracing::warn!("ML strategy enabled but no model runtime is built in; skipping");
    }
    Ok(config)
}

/// Run each image through the scan loop as one tick
fn decode_images(config: ScannerConfig, images: &[PathBuf]) -> Result<()> {
    let feed = FrameFeed::new();
    let clock = ManualClock::new(chrono::Utc::now().timestamp_millis());
    let tick_ms = config.tick_interval_ms as i64;

    let source = FrameSource::new(Box::new(StillBackend::new(feed.clone())));
    let arbiter = StrategyArbiter::new(build_strategies(&config, None, None), &config.strategy_order);
    let mut scan = ScanLoop::new(config, source, arbiter)
        .with_validator(Box::new(RetailCodeValidator::new()))
        .with_clock(Box::new(clock.clone()));

    scan.start().context("starting still-image source")?;

    let mut emitted = 0;
    for path in images {
        let image = image::open(path)
            .with_context(|| format!("opening {}", path.display()))?
            .to_rgba8();
        feed.push(image);

        match scan.tick() {
            TickOutcome::Detected(event) => {
                emitted += 1;
                println!(
                    "{}\t{}\t{}\t{}",
                    path.display(),
                    event.result.text,
                    event.result.format,
                    event.result.strategy_used
                );
            }
            TickOutcome::Suppressed => tracing::info!("{}: repeat suppressed", path.display()),
            TickOutcome::Rejected => tracing::info!("{}: payload rejected", path.display()),
            TickOutcome::Failed(fault) => anyhow::bail!("scanner failed: {}", fault),
            other => tracing::info!("{}: {:?}", path.display(), other),
        }
        clock.advance(tick_ms);
    }

    scan.stop();
    tracing::info!("✓ {} detection(s) from {} image(s)", emitted, images.len());
    Ok(())
}

#[cfg(feature = "camera")]
mod live {
    use std::io::BufRead;

    use anyhow::{Context, Result};

    use checkout_scanner::camera::{FrameSource, NokhwaBackend};
    use checkout_scanner::strategy::build_strategies;
    use checkout_scanner::zoom::ZoomGesture;
    use checkout_scanner::{RetailCodeValidator, ScanController, ScanEvent, ScanLoop, ScannerConfig, StrategyArbiter};

    /// Live scanning. Commands on stdin: `q` quit, `p` pause, `r` resume,
    /// `+`/`-` zoom, `t`/`T` torch on/off.
    pub fn run(config: ScannerConfig) -> Result<()> {
        let mut controller = ScanController::spawn(move || {
            let source = FrameSource::new(Box::new(NokhwaBackend::new()));
            let arbiter =
                StrategyArbiter::new(build_strategies(&config, None, None), &config.strategy_order);
            ScanLoop::new(config, source, arbiter).with_validator(Box::new(RetailCodeValidator::new()))
        })
        .context("spawning scan thread")?;

        let (events, _id) = controller.events();
        std::thread::Builder::new()
            .name("scan-events".into())
            .spawn(move || {
                for event in events.iter() {
                    match event {
                        ScanEvent::Detected(detection) => println!("{}", detection.text()),
                        ScanEvent::CameraFailed { error, retryable } => {
                            eprintln!("✗ {} ({})", error, error.user_hint());
                            if retryable {
                                eprintln!("  enter `s` to retry");
                            }
                        }
                        other => tracing::debug!("{:?}", other),
                    }
                }
            })
            .context("spawning event printer")?;

        controller.start();
        for line in std::io::stdin().lock().lines() {
            match line?.trim() {
                "q" => break,
                "s" => controller.start(),
                "p" => controller.pause(),
                "r" => controller.resume(),
                "+" => controller.zoom(ZoomGesture::Wheel { delta_y: -1.0 }),
                "-" => controller.zoom(ZoomGesture::Wheel { delta_y: 1.0 }),
                "t" => controller.torch(true),
                "T" => controller.torch(false),
                "" => {}
                other => eprintln!("unknown command: {}", other),
            }
        }

        controller.shutdown();
        Ok(())
    }
}

/// File logging with daily rotation, plus console output in debug builds.
/// The returned guard flushes the file writer on drop.
fn initialize_tracing() -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_appender::rolling;
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let log_dir = ScannerConfig::log_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Failed to create log directory: {}", e);
    }

    let file_appender = rolling::daily(&log_dir, "checkout-scanner.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    // In debug builds, also log to the console (stderr keeps stdout for results)
    #[cfg(debug_assertions)]
    {
        let console_layer = fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(true)
            .with_target(false);

        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .with(console_layer)
            .init();
    }

    #[cfg(not(debug_assertions))]
    {
        tracing_subscriber::registry()
            .with(filter)
            .with(file_layer)
            .init();
    }

    tracing::info!("Log directory: {}", log_dir.display());
    guard
}
