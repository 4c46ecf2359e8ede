use chrono::{DateTime, Utc};
use serde::Serialize;

use super::catalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    None,
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Whether this reading counts toward the session's detection tally.
    pub fn is_detection(&self) -> bool {
        !matches!(self, Severity::None)
    }
}

/// One classification reading. Immutable once created; each tick's reading
/// supersedes the previous one rather than mutating it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionResult {
    pub label: String,
    pub confidence_percent: u8,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub recommendations: Vec<String>,
    /// Display color tag tied to the category, not physically meaningful.
    pub accent_color: String,
}

impl DetectionResult {
    /// Build a reading for `label`, clamping confidence to 0..=100 and
    /// filling recommendations from the catalog (falling back to the fixed
    /// consult-an-expert sequence for unknown labels).
    pub fn new(
        label: impl Into<String>,
        confidence_percent: u8,
        severity: Severity,
        accent_color: impl Into<String>,
    ) -> Self {
        let label = label.into();
        let recommendations = catalog::recommendations_for(&label)
            .iter()
            .map(|r| r.to_string())
            .collect();
        Self {
            label,
            confidence_percent: confidence_percent.min(100),
            severity,
            timestamp: Utc::now(),
            recommendations,
            accent_color: accent_color.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn confidence_is_clamped_to_percent_range() {
        let result = DetectionResult::new("Leaf Rust", 130, Severity::High, "#ef4444");
        assert_eq!(result.confidence_percent, 100);
    }

    #[test]
    fn known_label_gets_catalog_recommendations() {
        let result = DetectionResult::new("Powdery Mildew", 92, Severity::Medium, "#f59e0b");
        assert_eq!(
            result.recommendations,
            vec!["Reduce humidity", "Apply neem oil", "Prune affected areas"]
        );
    }

    #[test]
    fn unknown_label_falls_back_to_expert_advice() {
        let result = DetectionResult::new("Root Rot", 50, Severity::High, "#ef4444");
        assert_eq!(
            result.recommendations,
            vec!["Consult plant expert", "Monitor closely"]
        );
        assert!(!result.recommendations.is_empty());
    }

    #[test]
    fn only_healthy_readings_skip_the_detection_tally() {
        assert!(!Severity::None.is_detection());
        assert!(Severity::Low.is_detection());
        assert!(Severity::Critical.is_detection());
    }
}
