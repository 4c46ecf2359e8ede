use async_trait::async_trait;

use crate::common::Frame;
use crate::error::DetectorError;

pub mod catalog;
pub mod mock;
pub mod result;

pub use mock::MockDetector;
pub use result::{DetectionResult, Severity};

/// Pluggable classification capability.
///
/// The scheduler only assumes `classify` eventually resolves or fails; a
/// local model, a remote call, or the mock picker all fit behind this.
#[async_trait]
pub trait Detector: Send + Sync {
    async fn classify(&self, frame: &Frame) -> Result<DetectionResult, DetectorError>;
    fn name(&self) -> &'static str;
}
