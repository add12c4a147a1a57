use frame_scan_common::config::ConfigError;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("scanner is already running")]
    AlreadyRunning,
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("failed to spawn decode worker thread: {0}")]
    WorkerSpawn(#[source] std::io::Error),
    #[error("scanner must be started from within a tokio runtime")]
    NoRuntime,
}
