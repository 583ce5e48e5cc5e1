//! ML service request/response types.

use serde::{Deserialize, Serialize};

/// One detection as returned by the inference service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireDetection {
    /// `[x1, y1, x2, y2]` in pixels
    pub bbox: [f64; 4],
    pub confidence: f64,
    /// Class index, when the service reports it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_id: Option<u32>,
}

/// Detection response.
///
/// Older service builds return a bare list, newer ones wrap it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetectResponse {
    List(Vec<WireDetection>),
    Wrapped { detections: Vec<WireDetection> },
}

impl DetectResponse {
    pub fn into_detections(self) -> Vec<WireDetection> {
        match self {
            DetectResponse::List(detections) => detections,
            DetectResponse::Wrapped { detections } => detections,
        }
    }
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_both_response_shapes_parse() {
        let bare = r#"[{"bbox":[0,0,10,10],"confidence":0.9}]"#;
        let wrapped = r#"{"detections":[{"bbox":[0,0,10,10],"confidence":0.9,"class_id":0}]}"#;

        let bare: DetectResponse = serde_json::from_str(bare).unwrap();
        let wrapped: DetectResponse = serde_json::from_str(wrapped).unwrap();

        assert_eq!(bare.into_detections().len(), 1);
        assert_eq!(wrapped.into_detections()[0].class_id, Some(0));
    }
}
