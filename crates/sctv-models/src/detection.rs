//! Detection models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::stream::StreamId;

/// Axis-aligned box in pixel coordinates, corner form.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct BoundingBox {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl BoundingBox {
    /// Create a new bounding box from its corners.
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    #[inline]
    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Box area in pixels.
    #[inline]
    pub fn area(&self) -> f64 {
        self.width() * self.height()
    }

    /// Center point `(x, y)`.
    #[inline]
    pub fn center(&self) -> (f64, f64) {
        ((self.x1 + self.x2) / 2.0, (self.y1 + self.y2) / 2.0)
    }
}

/// A single detection reported by the detector for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RawDetection {
    pub bbox: BoundingBox,
    /// Confidence in `[0, 1]`
    pub confidence: f64,
    pub center: (f64, f64),
    pub area: f64,
    /// When the frame was captured
    pub timestamp: DateTime<Utc>,
}

impl RawDetection {
    /// Build a detection, deriving center and area from the box.
    pub fn from_bbox(bbox: BoundingBox, confidence: f64, timestamp: DateTime<Utc>) -> Self {
        Self {
            center: bbox.center(),
            area: bbox.area(),
            bbox,
            confidence,
            timestamp,
        }
    }
}

/// Detection result for one analyzed frame of one stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DetectionSample {
    pub stream_id: StreamId,
    pub count: usize,
    pub timestamp: DateTime<Utc>,
}

impl DetectionSample {
    pub fn new(stream_id: StreamId, count: usize, timestamp: DateTime<Utc>) -> Self {
        Self {
            stream_id,
            count,
            timestamp,
        }
    }
}
