mod source;

use frame_scan_common::config::{Config, ConfigError};
use frame_scan_common::frame::FrameError;
use frame_scan_pipeline::{CaptureError, PipelineError, ScanEvent, Scanner};
use source::DirectorySource;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("failed to read frame directory {0}: {1}")]
    ReadDir(String, std::io::Error),
    #[error("no images found in {0}")]
    Empty(String),
    #[error("failed to load image {0}: {1}")]
    Image(String, image::ImageError),
    #[error("invalid frame: {0}")]
    Frame(#[from] FrameError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),
}

#[tokio::main]
async fn main() {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = match Config::load(&config_path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load config from {}: {e}", config_path.display());
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        dir = %config.replay.dir.display(),
        fps = config.replay.fps,
        repeat = config.replay.repeat,
        throttle_interval_ms = config.scanner.throttle_interval_ms,
        rescan_window_ms = config.scanner.rescan_window_ms,
        "starting frame-scan replay"
    );

    if let Err(e) = run(config).await {
        error!(error = %e, "replay failed");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), ReplayError> {
    let frames = source::load_frames(&config.replay.dir)?;
    info!(frames = frames.len(), "replay frames loaded");

    let source = DirectorySource::new(
        frames,
        config.replay.frame_interval(),
        config.replay.repeat,
    );
    let mut scanner = Scanner::from_config(&config)?;
    let (tx, mut rx) = mpsc::unbounded_channel();
    scanner.start(source, tx)?;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, stopping scanner");
                break;
            }
            event = rx.recv() => match event {
                Some(ScanEvent::Scanned { payload, .. }) => println!("{payload}"),
                Some(ScanEvent::CaptureFailed(CaptureError::Disconnected)) => {
                    info!("replay finished");
                    break;
                }
                Some(ScanEvent::CaptureFailed(e)) => {
                    warn!(error = %e, "capture failed");
                    break;
                }
                None => break,
            },
        }
    }

    if let Some(stats) = scanner.stop().await {
        info!(
            offered = stats.frames_offered,
            throttled = stats.frames_throttled,
            decoded = stats.payloads_decoded,
            reported = stats.payloads_reported,
            "replay summary"
        );
    }
    Ok(())
}
