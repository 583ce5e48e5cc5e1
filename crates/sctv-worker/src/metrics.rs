//! Prometheus metrics for the detection worker.

use std::net::SocketAddr;

use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::error::{WorkerError, WorkerResult};

/// Install the Prometheus recorder and serve `/metrics` on `addr`.
pub fn init_metrics(addr: SocketAddr) -> WorkerResult<()> {
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| WorkerError::config_error(format!("metrics exporter: {}", e)))
}

/// Metric names as constants for consistency.
pub mod names {
    // Pump metrics
    pub const FRAMES_READ_TOTAL: &str = "sctv_frames_read_total";
    pub const SOURCE_RECONNECTS_TOTAL: &str = "sctv_source_reconnects_total";

    // Detection metrics
    pub const DETECTIONS_RUN_TOTAL: &str = "sctv_detections_run_total";
    pub const DETECTION_FAILURES_TOTAL: &str = "sctv_detection_failures_total";
    pub const DETECTION_DURATION_SECONDS: &str = "sctv_detection_duration_seconds";

    // Event metrics
    pub const EVENTS_EMITTED_TOTAL: &str = "sctv_events_emitted_total";
    pub const EVENTS_DROPPED_TOTAL: &str = "sctv_events_dropped_total";
    pub const SINK_FAILURES_TOTAL: &str = "sctv_sink_failures_total";

    // Orchestration metrics
    pub const REGISTRY_FETCH_FAILURES_TOTAL: &str = "sctv_registry_fetch_failures_total";
    pub const ACTIVE_STREAMS: &str = "sctv_active_streams";
}

/// Record a pumped frame.
pub fn record_frame_read(stream_id: &str) {
    let labels = [("stream", stream_id.to_string())];
    counter!(names::FRAMES_READ_TOTAL, &labels).increment(1);
}

/// Record a source reopen.
pub fn record_reconnect(stream_id: &str) {
    let labels = [("stream", stream_id.to_string())];
    counter!(names::SOURCE_RECONNECTS_TOTAL, &labels).increment(1);
}

/// Record a detector call and its latency.
pub fn record_detection(stream_id: &str, duration_secs: f64) {
    let labels = [("stream", stream_id.to_string())];
    counter!(names::DETECTIONS_RUN_TOTAL, &labels).increment(1);
    histogram!(names::DETECTION_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn record_detection_failure(stream_id: &str) {
    let labels = [("stream", stream_id.to_string())];
    counter!(names::DETECTION_FAILURES_TOTAL, &labels).increment(1);
}

/// Record an approved event.
pub fn record_event_emitted(stream_id: &str) {
    let labels = [("stream", stream_id.to_string())];
    counter!(names::EVENTS_EMITTED_TOTAL, &labels).increment(1);
}

/// Record an event dropped because the sink queue was full or closed.
pub fn record_event_dropped() {
    counter!(names::EVENTS_DROPPED_TOTAL).increment(1);
}

pub fn record_sink_failure() {
    counter!(names::SINK_FAILURES_TOTAL).increment(1);
}

pub fn record_registry_failure() {
    counter!(names::REGISTRY_FETCH_FAILURES_TOTAL).increment(1);
}

/// Update the running-workers gauge.
pub fn set_active_streams(count: usize) {
    gauge!(names::ACTIVE_STREAMS).set(count as f64);
}
