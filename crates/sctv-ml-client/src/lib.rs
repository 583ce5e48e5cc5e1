//! Client for the object detection inference service.
//!
//! The service runs the vision model; this crate ships frames to it and
//! turns its answers into filtered `RawDetection`s behind the `Detector`
//! trait.

pub mod client;
pub mod error;
pub mod types;

pub use client::{HttpDetector, MlClientConfig};
pub use error::{MlError, MlResult};
pub use types::{DetectResponse, HealthResponse, WireDetection};
