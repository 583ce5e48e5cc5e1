//! Shared data models for the SCTV detection service.
//!
//! This crate provides Serde-serializable types for:
//! - Stream descriptors and source locators
//! - Raw detections and per-frame samples
//! - Detection events handed to sinks

pub mod detection;
pub mod event;
pub mod stream;

// Re-export common types
pub use detection::{BoundingBox, DetectionSample, RawDetection};
pub use event::{DetectionEvent, PERSON_DETECTION_EVENT};
pub use stream::{SourceLocator, StreamDescriptor, StreamId};
