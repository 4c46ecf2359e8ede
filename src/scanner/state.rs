use serde::Serialize;

use super::overlay::OverlayGeometry;
use crate::detect::DetectionResult;

/// Run state of the scan subsystem.
///
/// `Starting` and `Stopping` cover the in-flight camera acquisition and
/// teardown; acquisition failure resolves straight back to `Idle` after
/// surfacing the error, it is never persisted as a phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ScanPhase {
    #[default]
    Idle,
    Starting,
    Active,
    Stopping,
}

impl ScanPhase {
    pub fn is_scanning(&self) -> bool {
        matches!(self, ScanPhase::Active)
    }
}

/// Snapshot published to the presenter after every transition and tick.
///
/// One combined value per notification; the presenter redraws from it and
/// never mutates it.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ScanSessionState {
    pub phase: ScanPhase,
    pub last_result: Option<DetectionResult>,
    pub overlay: OverlayGeometry,
    pub scan_count: u64,
    pub detection_count: u64,
    /// One-shot notice from a failed tick; cleared by the next good one.
    pub advisory: Option<String>,
}
