use async_trait::async_trait;
use rand::seq::IndexedRandom;

use super::catalog;
use super::result::DetectionResult;
use super::Detector;
use crate::common::Frame;
use crate::error::DetectorError;

/// Demo detector: picks uniformly from the detectable conditions instead
/// of looking at pixels. Stands in for a real model behind the same trait.
pub struct MockDetector;

#[async_trait]
impl Detector for MockDetector {
    async fn classify(&self, _frame: &Frame) -> Result<DetectionResult, DetectorError> {
        let profile = catalog::DETECTABLE
            .choose(&mut rand::rng())
            .ok_or_else(|| DetectorError::Unavailable("detection table is empty".to_string()))?;
        Ok(DetectionResult::new(
            profile.label,
            profile.confidence_percent,
            profile.severity,
            profile.accent_color,
        ))
    }

    fn name(&self) -> &'static str {
        "mock-detector"
    }
}
