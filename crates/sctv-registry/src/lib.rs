//! Camera registry client.
//!
//! This crate provides:
//! - The `StreamRegistry` seam the orchestrator polls
//! - An HTTP implementation against the streaming API
//! - Tolerant unwrapping of the registry's response shapes

pub mod client;
pub mod error;
pub mod response;

use async_trait::async_trait;
use sctv_models::StreamDescriptor;

pub use client::{RegistryClient, RegistryConfig};
pub use error::{RegistryError, RegistryResult};
pub use response::{parse_descriptors, unwrap_stream_list};

/// Source of the desired set of streams.
#[async_trait]
pub trait StreamRegistry: Send + Sync {
    /// Fetch the streams that should currently be processed.
    ///
    /// `Err` means the registry could not be asked; an unrecognised answer
    /// is `Ok` with an empty list.
    async fn active_streams(&self) -> RegistryResult<Vec<StreamDescriptor>>;
}
