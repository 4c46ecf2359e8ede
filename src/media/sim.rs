use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use image::{DynamicImage, Rgb, RgbImage};
use tokio::sync::Notify;
use uuid::Uuid;

use super::{MediaConstraints, MediaHandle, MediaSource};
use crate::common::Frame;
use crate::error::AcquireError;

struct Feed {
    id: Uuid,
    dimensions: (u32, u32),
}

/// In-process stand-in for a hardware camera.
///
/// Grants or denies permission, enforces single acquisition, lets the feed
/// renegotiate its dimensions mid-session, and counts releases so teardown
/// behavior is observable. An optional gate holds `acquire` in flight until
/// notified, for exercising stop-before-grant races.
pub struct SimulatedCamera {
    permission_granted: bool,
    device_present: bool,
    feed: Mutex<Option<Feed>>,
    acquire_count: AtomicUsize,
    release_count: AtomicUsize,
    acquire_gate: Option<Arc<Notify>>,
}

impl SimulatedCamera {
    pub fn new() -> Self {
        Self {
            permission_granted: true,
            device_present: true,
            feed: Mutex::new(None),
            acquire_count: AtomicUsize::new(0),
            release_count: AtomicUsize::new(0),
            acquire_gate: None,
        }
    }

    pub fn with_permission_denied(mut self) -> Self {
        self.permission_granted = false;
        self
    }

    pub fn with_no_device(mut self) -> Self {
        self.device_present = false;
        self
    }

    /// Hold every `acquire` call until the returned gate is notified.
    pub fn with_acquire_gate(mut self, gate: Arc<Notify>) -> Self {
        self.acquire_gate = Some(gate);
        self
    }

    /// Simulate the device renegotiating its feed resolution.
    pub fn renegotiate_dimensions(&self, width: u32, height: u32) {
        let mut feed = self.feed.lock().unwrap();
        if let Some(feed) = feed.as_mut() {
            tracing::info!(
                "Camera renegotiated feed from {:?} to {:?}",
                feed.dimensions,
                (width, height)
            );
            feed.dimensions = (width, height);
        }
    }

    pub fn acquisitions(&self) -> usize {
        self.acquire_count.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.release_count.load(Ordering::SeqCst)
    }

    fn open_dimensions(&self, handle: &MediaHandle) -> Option<(u32, u32)> {
        let feed = self.feed.lock().unwrap();
        feed.as_ref()
            .filter(|feed| feed.id == handle.id())
            .map(|feed| feed.dimensions)
    }
}

impl Default for SimulatedCamera {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MediaSource for SimulatedCamera {
    fn name(&self) -> &'static str {
        "simulated-camera"
    }

    async fn acquire(&self, constraints: MediaConstraints) -> Result<MediaHandle, AcquireError> {
        if let Some(gate) = &self.acquire_gate {
            gate.notified().await;
        }
        if !self.permission_granted {
            return Err(AcquireError::PermissionDenied);
        }
        if !self.device_present {
            return Err(AcquireError::DeviceUnavailable {
                width: constraints.width,
                height: constraints.height,
            });
        }

        let mut feed = self.feed.lock().unwrap();
        if feed.is_some() {
            return Err(AcquireError::AlreadyAcquired);
        }
        let id = Uuid::new_v4();
        *feed = Some(Feed {
            id,
            dimensions: (constraints.width, constraints.height),
        });
        self.acquire_count.fetch_add(1, Ordering::SeqCst);
        tracing::info!(
            "Camera acquired at {}x{}, handle {}",
            constraints.width,
            constraints.height,
            id
        );
        Ok(MediaHandle::new(id, constraints.width, constraints.height))
    }

    async fn current_dimensions(&self, handle: &MediaHandle) -> Option<(u32, u32)> {
        self.open_dimensions(handle)
    }

    async fn grab_frame(&self, handle: &MediaHandle) -> Result<Frame, AcquireError> {
        let (width, height) = self
            .open_dimensions(handle)
            .ok_or(AcquireError::StaleHandle(handle.id()))?;
        // Uniform leaf-green frame; real pixel content is the detector's concern.
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([58, 125, 68])));
        Ok(Frame::new(image, Utc::now(), Uuid::new_v4()))
    }

    async fn release(&self, handle: &MediaHandle) {
        let mut feed = self.feed.lock().unwrap();
        match feed.as_ref() {
            Some(open) if open.id == handle.id() => {
                *feed = None;
                self.release_count.fetch_add(1, Ordering::SeqCst);
                tracing::info!("Camera released, handle {}", handle.id());
            }
            _ => {
                tracing::debug!("Ignoring release of unknown handle {}", handle.id());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_acquire_is_rejected_while_open() {
        let camera = SimulatedCamera::new();
        let handle = camera.acquire(MediaConstraints::default()).await.unwrap();
        let err = camera
            .acquire(MediaConstraints::default())
            .await
            .unwrap_err();
        assert_eq!(err, AcquireError::AlreadyAcquired);
        camera.release(&handle).await;
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let camera = SimulatedCamera::new();
        let handle = camera.acquire(MediaConstraints::default()).await.unwrap();
        camera.release(&handle).await;
        camera.release(&handle).await;
        assert_eq!(camera.releases(), 1);
        assert!(camera.current_dimensions(&handle).await.is_none());
    }

    #[tokio::test]
    async fn denied_permission_surfaces_typed_error() {
        let camera = SimulatedCamera::new().with_permission_denied();
        let err = camera
            .acquire(MediaConstraints::default())
            .await
            .unwrap_err();
        assert_eq!(err, AcquireError::PermissionDenied);
    }

    #[tokio::test]
    async fn missing_device_reports_requested_resolution() {
        let camera = SimulatedCamera::new().with_no_device();
        let err = camera
            .acquire(MediaConstraints {
                width: 640,
                height: 480,
            })
            .await
            .unwrap_err();
        assert_eq!(
            err,
            AcquireError::DeviceUnavailable {
                width: 640,
                height: 480
            }
        );
    }

    #[tokio::test]
    async fn renegotiation_is_visible_through_current_dimensions() {
        let camera = SimulatedCamera::new();
        let handle = camera.acquire(MediaConstraints::default()).await.unwrap();
        assert_eq!(camera.current_dimensions(&handle).await, Some((1280, 720)));
        camera.renegotiate_dimensions(640, 480);
        assert_eq!(camera.current_dimensions(&handle).await, Some((640, 480)));
        let frame = camera.grab_frame(&handle).await.unwrap();
        assert_eq!(frame.dimensions(), (640, 480));
        camera.release(&handle).await;
    }

    #[tokio::test]
    async fn grab_frame_after_release_is_stale() {
        let camera = SimulatedCamera::new();
        let handle = camera.acquire(MediaConstraints::default()).await.unwrap();
        camera.release(&handle).await;
        let err = camera.grab_frame(&handle).await.unwrap_err();
        assert_eq!(err, AcquireError::StaleHandle(handle.id()));
    }
}
