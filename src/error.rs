use thiserror::Error;
use uuid::Uuid;

// Main application error type

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Acquisition Error: {0}")]
    Acquire(#[from] AcquireError),
    #[error("Detector Error: {0}")]
    Detector(#[from] DetectorError),
    #[error("Configuration Error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("Scanner Setup Error: {0}")]
    Setup(String),
}

// Camera acquisition error type. Fatal to the attempted start(), never to
// the subsystem: the scheduler returns to Idle and start() can be retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AcquireError {
    #[error("Camera permission denied.")]
    PermissionDenied,
    #[error("No camera device matching {width}x{height}.")]
    DeviceUnavailable { width: u32, height: u32 },
    #[error("Camera is already acquired.")]
    AlreadyAcquired,
    #[error("Camera handle {0} is no longer open.")]
    StaleHandle(Uuid),
}

// Tick-time detector error type. Transient: logged and surfaced as an
// advisory on the published snapshot; the last good result is kept.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DetectorError {
    #[error("Inference failed: {0}")]
    Inference(String),
    #[error("Detector unavailable: {0}")]
    Unavailable(String),
}
