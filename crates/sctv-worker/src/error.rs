//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Registry error: {0}")]
    Registry(#[from] sctv_registry::RegistryError),

    #[error("Media error: {0}")]
    Media(#[from] sctv_media::MediaError),

    #[error("Detector error: {0}")]
    Detector(#[from] sctv_ml_client::MlError),

    #[error("Sink error: {0}")]
    Sink(#[from] crate::sink::SinkError),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }
}
