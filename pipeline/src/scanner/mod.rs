mod controller;
pub mod session;

use std::time::Duration;

use frame_scan_common::config::{Config, ConfigError, DecoderConfig, ScannerConfig};
use tokio::runtime::Handle;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::decoder::{barcode_decoder_factory, DecoderFactory};
use crate::error::PipelineError;
use crate::events::ScanListener;
use crate::source::FrameSource;
use crate::worker::DecodeWorker;
use controller::ScanController;

pub use session::{ScanSession, ScanStats};

struct ActiveScan {
    stop: oneshot::Sender<()>,
    task: JoinHandle<ScanStats>,
}

/// Lifecycle handle for the live-frame decode pipeline.
///
/// Settings changed through the setters are validated immediately and take
/// effect on the next [`Scanner::start`].
pub struct Scanner {
    scanner_config: ScannerConfig,
    decoder_config: DecoderConfig,
    decoder_factory: DecoderFactory,
    active: Option<ActiveScan>,
}

impl Scanner {
    /// Scanner using the built-in multi-format barcode decoder.
    pub fn new(scanner: ScannerConfig, decoder: DecoderConfig) -> Result<Self, ConfigError> {
        Self::with_decoder_factory(scanner, decoder, barcode_decoder_factory())
    }

    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Self::new(config.scanner.clone(), config.decoder.clone())
    }

    pub fn with_decoder_factory(
        scanner: ScannerConfig,
        decoder: DecoderConfig,
        factory: DecoderFactory,
    ) -> Result<Self, ConfigError> {
        scanner.validate()?;
        decoder.validate()?;
        Ok(Self {
            scanner_config: scanner,
            decoder_config: decoder,
            decoder_factory: factory,
            active: None,
        })
    }

    pub fn set_throttle_interval(&mut self, interval: Duration) -> Result<(), ConfigError> {
        let candidate = ScannerConfig {
            throttle_interval_ms: interval.as_millis().try_into().unwrap_or(u64::MAX),
            ..self.scanner_config.clone()
        };
        candidate.validate()?;
        self.scanner_config = candidate;
        Ok(())
    }

    pub fn set_rescan_window(&mut self, window: Duration) -> Result<(), ConfigError> {
        let candidate = ScannerConfig {
            rescan_window_ms: window.as_millis().try_into().unwrap_or(u64::MAX),
            ..self.scanner_config.clone()
        };
        candidate.validate()?;
        self.scanner_config = candidate;
        Ok(())
    }

    pub fn set_scan_area_fraction(&mut self, fraction: f64) -> Result<(), ConfigError> {
        let candidate = DecoderConfig {
            scan_area_fraction: fraction,
            ..self.decoder_config.clone()
        };
        candidate.validate()?;
        self.decoder_config = candidate;
        Ok(())
    }

    pub fn set_try_rotated(&mut self, try_rotated: bool) {
        self.decoder_config.try_rotated = try_rotated;
    }

    pub fn scanner_config(&self) -> &ScannerConfig {
        &self.scanner_config
    }

    pub fn decoder_config(&self) -> &DecoderConfig {
        &self.decoder_config
    }

    pub fn is_running(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|active| !active.task.is_finished())
    }

    /// Start scanning: fresh scan record, new decode worker, and a controller
    /// task on the current tokio runtime that arms `source` for its first frame.
    pub fn start<S, L>(&mut self, source: S, listener: L) -> Result<(), PipelineError>
    where
        S: FrameSource + 'static,
        L: ScanListener + 'static,
    {
        if self
            .active
            .as_ref()
            .is_some_and(|active| active.task.is_finished())
        {
            warn!("previous scan ended without stop, discarding it");
            self.active = None;
        }
        if self.active.is_some() {
            return Err(PipelineError::AlreadyRunning);
        }
        let runtime = Handle::try_current().map_err(|_| PipelineError::NoRuntime)?;

        let decoder = (self.decoder_factory)(&self.decoder_config)?;
        let decoder_name = decoder.name().to_owned();
        let (results_tx, results_rx) = mpsc::unbounded_channel();
        let worker = DecodeWorker::spawn(decoder, results_tx).map_err(PipelineError::WorkerSpawn)?;

        let session = ScanSession::new(&self.scanner_config);
        let controller = ScanController::new(session, worker, results_rx, source, listener);
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = runtime.spawn(controller.run(stop_rx));

        info!(
            decoder = %decoder_name,
            throttle_interval_ms = self.scanner_config.throttle_interval_ms,
            rescan_window_ms = self.scanner_config.rescan_window_ms,
            scan_area_fraction = self.decoder_config.scan_area_fraction,
            "scanner started"
        );
        self.active = Some(ActiveScan {
            stop: stop_tx,
            task,
        });
        Ok(())
    }

    /// Stop scanning and return the session counters. Calling it again, or
    /// before any `start`, is a no-op returning `None`.
    pub async fn stop(&mut self) -> Option<ScanStats> {
        let active = self.active.take()?;
        let _ = active.stop.send(());
        match active.task.await {
            Ok(stats) => Some(stats),
            Err(e) => {
                warn!(error = %e, "scanner task ended abnormally");
                None
            }
        }
    }
}

impl Drop for Scanner {
    fn drop(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.stop.send(());
        }
    }
}
