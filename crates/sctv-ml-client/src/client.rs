//! Inference service HTTP client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use sctv_media::{encode_jpeg, DetectionFilter, Detector, Frame, MediaError, MediaResult};
use sctv_models::{BoundingBox, RawDetection};
use tracing::{debug, warn};

use crate::error::{MlError, MlResult};
use crate::types::{DetectResponse, HealthResponse};

/// COCO class index for "person".
const PERSON_CLASS: u32 = 0;

/// Configuration for the detector client.
#[derive(Debug, Clone)]
pub struct MlClientConfig {
    /// Base URL of the inference service
    pub base_url: String,
    /// Request timeout
    pub timeout: Duration,
    /// Max retries
    pub max_retries: u32,
    /// Model reference forwarded to the service
    pub model: String,
    /// Confidence threshold, forwarded and enforced locally
    pub confidence_threshold: f64,
    /// NMS IoU threshold
    pub nms_threshold: f64,
    /// Minimum box area kept
    pub min_area: f64,
    /// JPEG quality of uploaded frames
    pub jpeg_quality: u8,
}

impl Default for MlClientConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8001".to_string(),
            timeout: Duration::from_secs(10),
            max_retries: 1,
            model: "yolov8n.pt".to_string(),
            confidence_threshold: 0.5,
            nms_threshold: 0.4,
            min_area: sctv_media::DEFAULT_MIN_AREA,
            jpeg_quality: 90,
        }
    }
}

/// `Detector` backed by the inference service.
pub struct HttpDetector {
    http: Client,
    config: MlClientConfig,
    filter: DetectionFilter,
}

impl HttpDetector {
    /// Create a new detector client.
    pub fn new(config: MlClientConfig) -> MlResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(MlError::Network)?;
        let filter = DetectionFilter::new(config.confidence_threshold, config.min_area);

        Ok(Self {
            http,
            config,
            filter,
        })
    }

    pub fn config(&self) -> &MlClientConfig {
        &self.config
    }

    /// Check if the inference service is healthy.
    pub async fn health_check(&self) -> MlResult<bool> {
        let url = format!("{}/health", self.config.base_url.trim_end_matches('/'));

        match self.http.get(&url).send().await {
            Ok(response) if response.status().is_success() => {
                let health: HealthResponse = response.json().await?;
                Ok(health.status == "healthy" || health.status == "ok")
            }
            Ok(response) => {
                warn!("ML service health check failed: {}", response.status());
                Ok(false)
            }
            Err(e) => {
                warn!("ML service health check error: {}", e);
                Ok(false)
            }
        }
    }

    /// Run detection on one frame, returning filtered detections.
    pub async fn detect_frame(&self, frame: &Frame) -> MlResult<Vec<RawDetection>> {
        let url = format!("{}/detect", self.config.base_url.trim_end_matches('/'));
        let body = encode_jpeg(frame, self.config.jpeg_quality)?;
        let query = [
            ("model", self.config.model.clone()),
            ("conf", self.config.confidence_threshold.to_string()),
            ("iou", self.config.nms_threshold.to_string()),
            ("classes", PERSON_CLASS.to_string()),
        ];

        debug!("Sending {} byte frame to {}", body.len(), url);

        let response = self
            .with_retry(|| async {
                let response = self
                    .http
                    .post(&url)
                    .query(&query)
                    .header(reqwest::header::CONTENT_TYPE, "image/jpeg")
                    .body(body.clone())
                    .send()
                    .await
                    .map_err(MlError::Network)?;

                if response.status() == reqwest::StatusCode::SERVICE_UNAVAILABLE {
                    return Err(MlError::ServiceUnavailable(response.status().to_string()));
                }
                Ok(response)
            })
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MlError::RequestFailed(format!(
                "ML service returned {}: {}",
                status, body
            )));
        }

        let body = response.bytes().await?;
        let parsed: DetectResponse = serde_json::from_slice(&body)
            .map_err(|e| MlError::InvalidResponse(e.to_string()))?;
        let detections = parsed
            .into_detections()
            .into_iter()
            .filter(|d| d.class_id.map_or(true, |c| c == PERSON_CLASS))
            .map(|d| {
                let [x1, y1, x2, y2] = d.bbox;
                RawDetection::from_bbox(
                    BoundingBox::new(x1, y1, x2, y2),
                    d.confidence,
                    frame.captured_at,
                )
            })
            .collect();

        Ok(self.filter.apply(detections))
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> MlResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = MlResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(100 * 2u64.pow(attempt));
                    warn!(
                        "ML request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or(MlError::RequestFailed("Unknown error".to_string())))
    }
}

#[async_trait]
impl Detector for HttpDetector {
    async fn detect(&self, frame: &Frame) -> MediaResult<Vec<RawDetection>> {
        self.detect_frame(frame)
            .await
            .map_err(|e| MediaError::detection_failed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = MlClientConfig::default();
        assert_eq!(config.base_url, "http://localhost:8001");
        assert_eq!(config.confidence_threshold, 0.5);
        assert_eq!(config.min_area, 1000.0);
    }
}
