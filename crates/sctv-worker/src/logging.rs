//! Structured per-stream logging.
//!
//! Every line a worker emits carries the stream id and name so that log
//! output from concurrent workers can be told apart.

use tracing::{info, warn, Span};

use sctv_models::StreamDescriptor;

/// Logger bound to one stream.
#[derive(Debug, Clone)]
pub struct StreamLogger {
    stream_id: String,
    stream_name: String,
}

impl StreamLogger {
    pub fn new(stream: &StreamDescriptor) -> Self {
        Self {
            stream_id: stream.id.to_string(),
            stream_name: stream.name.clone(),
        }
    }

    /// Log worker start.
    pub fn log_start(&self, message: &str) {
        info!(
            stream_id = %self.stream_id,
            stream_name = %self.stream_name,
            "Stream started: {}", message
        );
    }

    /// Log a lifecycle state change.
    pub fn log_state(&self, message: &str) {
        info!(
            stream_id = %self.stream_id,
            stream_name = %self.stream_name,
            "Stream state: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            stream_id = %self.stream_id,
            stream_name = %self.stream_name,
            "Stream warning: {}", message
        );
    }

    /// Log worker exit.
    pub fn log_stopped(&self, message: &str) {
        info!(
            stream_id = %self.stream_id,
            stream_name = %self.stream_name,
            "Stream stopped: {}", message
        );
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    /// Span the worker task is instrumented with.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "stream",
            stream_id = %self.stream_id,
            stream_name = %self.stream_name
        )
    }
}
