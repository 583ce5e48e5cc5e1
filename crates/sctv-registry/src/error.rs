//! Registry error types.

use thiserror::Error;

pub type RegistryResult<T> = Result<T, RegistryError>;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Invalid registry URL: {0}")]
    InvalidUrl(String),

    #[error("Registry returned status {0}")]
    BadStatus(u16),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
}
