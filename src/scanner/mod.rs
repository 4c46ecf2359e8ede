pub mod overlay;
pub mod scheduler;
pub mod state;

pub use overlay::OverlayGeometry;
pub use scheduler::{DetectionScheduler, DetectionSchedulerBuilder};
pub use state::{ScanPhase, ScanSessionState};
