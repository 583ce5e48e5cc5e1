//! Seams to the external collaborators of a stream worker.
//!
//! Frame acquisition and object recognition are supplied from outside the
//! orchestration engine. Each trait here is the only surface the worker
//! sees, so test doubles and alternative backends slot in without touching
//! the pump loop.

use async_trait::async_trait;
use sctv_models::{RawDetection, StreamDescriptor};

use crate::error::MediaResult;
use crate::frame::Frame;

/// An open frame source for one stream.
#[async_trait]
pub trait FrameSource: Send {
    /// Read the next frame.
    ///
    /// `Ok(None)` means the source yielded no data (end of stream or a
    /// dropped connection); the caller is expected to close and reopen.
    async fn read(&mut self) -> MediaResult<Option<Frame>>;

    /// Release the underlying resources. Must be safe to call more than once.
    async fn close(&mut self);
}

/// Opens frame sources from stream descriptors.
///
/// Called again with the same descriptor after a failure, so opening must
/// not depend on any state left by a previous source.
#[async_trait]
pub trait FrameSourceFactory: Send + Sync {
    async fn open(&self, stream: &StreamDescriptor) -> MediaResult<Box<dyn FrameSource>>;
}

/// Object detector.
///
/// Stateless across calls. Implementations apply their own confidence and
/// minimum-area filtering before returning.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn detect(&self, frame: &Frame) -> MediaResult<Vec<RawDetection>>;
}
