//! Post-detection filtering.

use sctv_models::RawDetection;

/// Detections with an area at or below this are ignored.
pub const DEFAULT_MIN_AREA: f64 = 1000.0;

/// Confidence and size filter applied by detectors before returning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DetectionFilter {
    pub confidence_threshold: f64,
    /// Exclusive lower bound on box area
    pub min_area: f64,
}

impl Default for DetectionFilter {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            min_area: DEFAULT_MIN_AREA,
        }
    }
}

impl DetectionFilter {
    pub fn new(confidence_threshold: f64, min_area: f64) -> Self {
        Self {
            confidence_threshold,
            min_area,
        }
    }

    #[inline]
    pub fn accepts(&self, detection: &RawDetection) -> bool {
        detection.confidence >= self.confidence_threshold && detection.area > self.min_area
    }

    /// Keep only the detections that pass the filter.
    pub fn apply(&self, detections: Vec<RawDetection>) -> Vec<RawDetection> {
        detections.into_iter().filter(|d| self.accepts(d)).collect()
    }
}
