//! Worker configuration.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use sctv_media::FfmpegSourceConfig;
use sctv_ml_client::MlClientConfig;
use sctv_registry::RegistryConfig;

use crate::error::{WorkerError, WorkerResult};
use crate::smoother::{SmootherConfig, CONSISTENCY_SPAN};

/// Worker configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Streaming API base address (registry)
    pub api_base_url: String,
    /// Registry request timeout
    pub registry_timeout: Duration,
    /// Period between reconciliations
    pub reconcile_interval: Duration,
    /// Inference service base address
    pub detector_url: String,
    /// Per-call detector timeout
    pub detector_timeout: Duration,
    /// Model reference forwarded to the inference service
    pub model_path: String,
    pub confidence_threshold: f64,
    pub nms_threshold: f64,
    /// Detections with an area at or below this are dropped
    pub min_detection_area: f64,
    /// Run detection on every Nth pumped frame
    pub process_every_n_frames: u64,
    /// Pump rate cap
    pub target_fps: f64,
    /// Wait before reopening a failed source
    pub read_failure_backoff: Duration,
    /// Bounded wait for a single worker to stop
    pub worker_stop_timeout: Duration,
    /// Minimum spacing between events of one stream
    pub detection_cooldown: Duration,
    /// Smoother history length
    pub smoother_window: usize,
    /// Attach an annotated JPEG to events
    pub send_frame: bool,
    pub jpeg_quality: u8,
    pub frame_width: u32,
    pub frame_height: u32,
    /// Optional HTTP endpoint receiving events as JSON
    pub event_webhook_url: Option<String>,
    /// Per-delivery webhook timeout
    pub event_webhook_timeout: Duration,
    /// Sink queue size; events beyond it are dropped
    pub event_queue_capacity: usize,
    /// Prometheus exporter listen address
    pub metrics_addr: Option<SocketAddr>,
    pub log_level: String,
    pub log_json: bool,
    pub log_file: Option<String>,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            api_base_url: "https://localhost:44322".to_string(),
            registry_timeout: Duration::from_secs(10),
            reconcile_interval: Duration::from_secs(30),
            detector_url: "http://localhost:8001".to_string(),
            detector_timeout: Duration::from_secs(10),
            model_path: "yolov8n.pt".to_string(),
            confidence_threshold: 0.5,
            nms_threshold: 0.4,
            min_detection_area: sctv_media::DEFAULT_MIN_AREA,
            process_every_n_frames: 15,
            target_fps: 20.0,
            read_failure_backoff: Duration::from_secs(1),
            worker_stop_timeout: Duration::from_secs(5),
            detection_cooldown: Duration::from_secs(10),
            smoother_window: 5,
            send_frame: true,
            jpeg_quality: sctv_media::DEFAULT_JPEG_QUALITY,
            frame_width: 1280,
            frame_height: 720,
            event_webhook_url: None,
            event_webhook_timeout: Duration::from_secs(5),
            event_queue_capacity: 256,
            metrics_addr: None,
            log_level: "info".to_string(),
            log_json: false,
            log_file: None,
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    ///
    /// Unparsable values fall back to their defaults; call `validate`
    /// before using the result.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            api_base_url: std::env::var("API_BASE_URL").unwrap_or(defaults.api_base_url),
            registry_timeout: Duration::from_secs(env_or("REGISTRY_TIMEOUT_SECS", 10)),
            reconcile_interval: Duration::from_secs(env_or("RECONCILE_INTERVAL_SECS", 30)),
            detector_url: std::env::var("DETECTOR_URL").unwrap_or(defaults.detector_url),
            detector_timeout: Duration::from_secs(env_or("DETECTOR_TIMEOUT_SECS", 10)),
            model_path: std::env::var("MODEL_PATH").unwrap_or(defaults.model_path),
            confidence_threshold: env_or("CONFIDENCE_THRESHOLD", defaults.confidence_threshold),
            nms_threshold: env_or("NMS_THRESHOLD", defaults.nms_threshold),
            min_detection_area: env_or("MIN_DETECTION_AREA", defaults.min_detection_area),
            process_every_n_frames: env_or(
                "PROCESS_EVERY_N_FRAMES",
                defaults.process_every_n_frames,
            ),
            target_fps: env_or("TARGET_FPS", defaults.target_fps),
            read_failure_backoff: Duration::from_millis(env_or("READ_FAILURE_BACKOFF_MS", 1000)),
            worker_stop_timeout: Duration::from_secs(env_or("WORKER_STOP_TIMEOUT_SECS", 5)),
            detection_cooldown: Duration::try_from_secs_f64(env_or(
                "DETECTION_COOLDOWN_SECS",
                10.0_f64,
            ))
            .unwrap_or(defaults.detection_cooldown),
            smoother_window: env_or("SMOOTHER_WINDOW", defaults.smoother_window),
            send_frame: std::env::var("SEND_FRAME")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(defaults.send_frame),
            jpeg_quality: env_or("JPEG_QUALITY", defaults.jpeg_quality),
            frame_width: env_or("FRAME_WIDTH", defaults.frame_width),
            frame_height: env_or("FRAME_HEIGHT", defaults.frame_height),
            event_webhook_url: std::env::var("EVENT_WEBHOOK_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            event_webhook_timeout: Duration::from_secs(env_or("EVENT_WEBHOOK_TIMEOUT_SECS", 5)),
            event_queue_capacity: env_or("EVENT_QUEUE_CAPACITY", defaults.event_queue_capacity),
            metrics_addr: std::env::var("METRICS_ADDR")
                .ok()
                .and_then(|s| s.parse().ok()),
            log_level: std::env::var("LOG_LEVEL")
                .map(|v| v.to_lowercase())
                .unwrap_or(defaults.log_level),
            log_json: std::env::var("LOG_FORMAT")
                .map(|v| v.to_lowercase() == "json")
                .unwrap_or(false),
            log_file: std::env::var("LOG_FILE").ok().filter(|v| !v.trim().is_empty()),
        }
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.process_every_n_frames == 0 {
            return Err(WorkerError::config_error(
                "PROCESS_EVERY_N_FRAMES must be at least 1",
            ));
        }
        if !(self.target_fps.is_finite() && self.target_fps > 0.0) {
            return Err(WorkerError::config_error("TARGET_FPS must be positive"));
        }
        if Duration::try_from_secs_f64(1.0 / self.target_fps).is_err() {
            return Err(WorkerError::config_error(format!(
                "TARGET_FPS {} gives an unrepresentable frame interval",
                self.target_fps
            )));
        }
        if self.smoother_window < CONSISTENCY_SPAN {
            return Err(WorkerError::config_error(format!(
                "SMOOTHER_WINDOW must be at least {}",
                CONSISTENCY_SPAN
            )));
        }
        if self.event_queue_capacity == 0 {
            return Err(WorkerError::config_error(
                "EVENT_QUEUE_CAPACITY must be at least 1",
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(WorkerError::config_error("JPEG_QUALITY must be within 1..=100"));
        }
        if self.frame_width == 0 || self.frame_height == 0 {
            return Err(WorkerError::config_error("frame dimensions must be non-zero"));
        }
        if self.event_webhook_timeout.is_zero() {
            return Err(WorkerError::config_error(
                "EVENT_WEBHOOK_TIMEOUT_SECS must be at least 1",
            ));
        }
        if self.reconcile_interval.is_zero() {
            return Err(WorkerError::config_error(
                "RECONCILE_INTERVAL_SECS must be at least 1",
            ));
        }
        Ok(())
    }

    /// Time budget for one pumped frame.
    ///
    /// Falls back to no pacing for a rate `validate` would reject.
    pub fn target_frame_interval(&self) -> Duration {
        Duration::try_from_secs_f64(1.0 / self.target_fps).unwrap_or(Duration::ZERO)
    }

    pub fn smoother_config(&self) -> SmootherConfig {
        SmootherConfig {
            window: self.smoother_window,
            cooldown: self.detection_cooldown,
        }
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            base_url: self.api_base_url.clone(),
            timeout: self.registry_timeout,
        }
    }

    pub fn ml_client_config(&self) -> MlClientConfig {
        MlClientConfig {
            base_url: self.detector_url.clone(),
            timeout: self.detector_timeout,
            model: self.model_path.clone(),
            confidence_threshold: self.confidence_threshold,
            nms_threshold: self.nms_threshold,
            min_area: self.min_detection_area,
            ..Default::default()
        }
    }

    pub fn source_config(&self) -> FfmpegSourceConfig {
        FfmpegSourceConfig {
            width: self.frame_width,
            height: self.frame_height,
            ..Default::default()
        }
    }
}

fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}
