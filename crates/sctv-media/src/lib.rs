//! Frame acquisition and detector seams for stream monitoring.
//!
//! This crate provides:
//! - The `FrameSource` / `FrameSourceFactory` / `Detector` traits
//! - An FFmpeg-backed frame source for RTSP, HTTP, file and v4l2 inputs
//! - Confidence / area filtering of raw detections
//! - Frame annotation and JPEG/base64 encoding for event payloads

pub mod annotate;
pub mod error;
pub mod ffmpeg_source;
pub mod filter;
pub mod frame;
pub mod traits;

pub use annotate::{annotate_frame, encode_jpeg, encode_jpeg_base64, DEFAULT_JPEG_QUALITY};
pub use error::{MediaError, MediaResult};
pub use ffmpeg_source::{FfmpegFrameSource, FfmpegSourceConfig, FfmpegSourceFactory};
pub use filter::{DetectionFilter, DEFAULT_MIN_AREA};
pub use frame::Frame;
pub use traits::{Detector, FrameSource, FrameSourceFactory};
