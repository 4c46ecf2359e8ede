use async_trait::async_trait;
use uuid::Uuid;

use crate::common::Frame;
use crate::error::AcquireError;

pub mod sim;

pub use sim::SimulatedCamera;

/// Requested capture resolution, matching the reference session's
/// 1280x720 video constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MediaConstraints {
    pub width: u32,
    pub height: u32,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Opaque token for an acquired camera feed.
///
/// Carries the dimensions reported at acquisition time; the live feed may
/// renegotiate, so consumers query `MediaSource::current_dimensions` each
/// tick rather than trusting these.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaHandle {
    id: Uuid,
    width: u32,
    height: u32,
}

impl MediaHandle {
    pub fn new(id: Uuid, width: u32, height: u32) -> Self {
        Self { id, width, height }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn acquired_dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }
}

/// Exclusive owner of the camera resource.
///
/// At most one handle may be open per source. `release` is idempotent:
/// releasing an unknown or already-released handle is a no-op, because
/// teardown can race with an explicit stop.
#[async_trait]
pub trait MediaSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Open the camera at the requested resolution.
    async fn acquire(&self, constraints: MediaConstraints) -> Result<MediaHandle, AcquireError>;

    /// Live dimensions of the active feed. `None` once the handle has been
    /// released out from under the caller.
    async fn current_dimensions(&self, handle: &MediaHandle) -> Option<(u32, u32)>;

    /// Capture the current frame for classification.
    async fn grab_frame(&self, handle: &MediaHandle) -> Result<Frame, AcquireError>;

    /// Stop the underlying tracks and invalidate the handle.
    async fn release(&self, handle: &MediaHandle);
}
