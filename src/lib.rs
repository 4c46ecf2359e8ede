pub mod common;
pub mod config;
pub mod detect;
pub mod error;
pub mod media;
pub mod scanner;

pub use error::{AcquireError, DetectorError, ScanError};

pub use config::Configuration;
pub use detect::{DetectionResult, Detector, MockDetector, Severity};
pub use media::{MediaConstraints, MediaHandle, MediaSource, SimulatedCamera};
pub use scanner::{DetectionScheduler, OverlayGeometry, ScanPhase, ScanSessionState};
