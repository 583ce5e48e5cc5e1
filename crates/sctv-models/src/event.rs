//! Detection events emitted to sinks.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::detection::RawDetection;
use crate::stream::StreamId;

/// Event type tag carried by every detection event.
pub const PERSON_DETECTION_EVENT: &str = "person_detection";

/// A debounced detection, ready for delivery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DetectionEvent {
    /// Unique event id
    pub event_id: Uuid,
    pub event_type: String,
    pub stream_id: StreamId,
    /// Display name of the stream
    pub stream_name: String,
    pub detections: Vec<RawDetection>,
    pub detection_count: usize,
    pub timestamp: DateTime<Utc>,
    /// Annotated frame, JPEG, base64-encoded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frame_jpeg_base64: Option<String>,
}

impl DetectionEvent {
    /// Create a new event without a frame payload.
    pub fn new(
        stream_id: StreamId,
        stream_name: impl Into<String>,
        detections: Vec<RawDetection>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            event_type: PERSON_DETECTION_EVENT.to_string(),
            stream_id,
            stream_name: stream_name.into(),
            detection_count: detections.len(),
            detections,
            timestamp,
            frame_jpeg_base64: None,
        }
    }

    /// Attach the annotated frame payload.
    pub fn with_frame(mut self, frame_jpeg_base64: String) -> Self {
        self.frame_jpeg_base64 = Some(frame_jpeg_base64);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::BoundingBox;

    #[test]
    fn test_event_counts_detections() {
        let now = Utc::now();
        let detections = vec![
            RawDetection::from_bbox(BoundingBox::new(0.0, 0.0, 50.0, 50.0), 0.8, now),
            RawDetection::from_bbox(BoundingBox::new(60.0, 0.0, 120.0, 90.0), 0.7, now),
        ];
        let event = DetectionEvent::new(StreamId::from("cam-1"), "Lobby", detections, now);

        assert_eq!(event.detection_count, 2);
        assert_eq!(event.event_type, PERSON_DETECTION_EVENT);
        assert!(event.frame_jpeg_base64.is_none());
    }

    #[test]
    fn test_frame_omitted_from_json_when_absent() {
        let event = DetectionEvent::new(StreamId::from("cam-1"), "Lobby", vec![], Utc::now());
        let json = serde_json::to_value(&event).unwrap();
        assert!(json.get("frame_jpeg_base64").is_none());

        let json = serde_json::to_value(event.with_frame("abc".into())).unwrap();
        assert_eq!(json["frame_jpeg_base64"], "abc");
    }
}
