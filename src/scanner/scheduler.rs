use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::overlay::OverlayGeometry;
use super::state::{ScanPhase, ScanSessionState};
use crate::config::Configuration;
use crate::detect::{DetectionResult, Detector};
use crate::error::{AcquireError, ScanError};
use crate::media::{MediaConstraints, MediaHandle, MediaSource};

/// Owner of the scan lifecycle and all mutable scan state.
///
/// Ticks, `start()`, and `stop()` coordinate through one internal lock and
/// a generation counter, so a stop that lands while an acquisition is in
/// flight supersedes it: the late grant releases the handle it acquired
/// instead of installing it.
pub struct DetectionScheduler {
    media: Arc<dyn MediaSource>,
    detector: Arc<dyn Detector>,
    interval: Duration,
    constraints: MediaConstraints,
    shared: Arc<Shared>,
}

struct Shared {
    inner: Mutex<Inner>,
    state_tx: watch::Sender<ScanSessionState>,
}

#[derive(Default)]
struct Inner {
    phase: ScanPhase,
    generation: u64,
    handle: Option<MediaHandle>,
    cancel: Option<CancellationToken>,
    tick_task: Option<JoinHandle<()>>,
    last_result: Option<DetectionResult>,
    overlay: OverlayGeometry,
    scan_count: u64,
    detection_count: u64,
    advisory: Option<String>,
}

impl Inner {
    fn snapshot(&self) -> ScanSessionState {
        ScanSessionState {
            phase: self.phase,
            last_result: self.last_result.clone(),
            overlay: self.overlay.clone(),
            scan_count: self.scan_count,
            detection_count: self.detection_count,
            advisory: self.advisory.clone(),
        }
    }

    fn reset_session(&mut self) {
        self.last_result = None;
        self.overlay = OverlayGeometry::default();
        self.scan_count = 0;
        self.detection_count = 0;
        self.advisory = None;
    }
}

impl Shared {
    fn publish(&self) {
        let snapshot = self.inner.lock().unwrap().snapshot();
        self.state_tx.send_replace(snapshot);
    }
}

impl DetectionScheduler {
    pub fn new(
        media: Arc<dyn MediaSource>,
        detector: Arc<dyn Detector>,
        configuration: Configuration,
    ) -> Self {
        let (state_tx, _) = watch::channel(ScanSessionState::default());
        Self {
            media,
            detector,
            interval: Duration::from_millis(configuration.tick_interval_ms),
            constraints: configuration.constraints(),
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner::default()),
                state_tx,
            }),
        }
    }

    pub fn builder(configuration: Configuration) -> DetectionSchedulerBuilder {
        DetectionSchedulerBuilder::new(configuration)
    }

    /// Snapshots after every lifecycle transition and tick.
    pub fn subscribe(&self) -> watch::Receiver<ScanSessionState> {
        self.shared.state_tx.subscribe()
    }

    /// Current state without subscribing.
    pub fn snapshot(&self) -> ScanSessionState {
        self.shared.state_tx.borrow().clone()
    }

    /// Current overlay geometry.
    pub fn overlay(&self) -> OverlayGeometry {
        self.shared.inner.lock().unwrap().overlay.clone()
    }

    /// Acquire the camera and begin the detection loop.
    ///
    /// A no-op unless the scanner is idle, so calling it twice acquires the
    /// camera once. Acquisition failure surfaces as a typed error and the
    /// scanner returns to idle, ready for a retry.
    pub async fn start(&self) -> Result<(), AcquireError> {
        let generation = {
            let mut inner = self.shared.inner.lock().unwrap();
            if inner.phase != ScanPhase::Idle {
                debug!("start() ignored: scanner is {:?}", inner.phase);
                return Ok(());
            }
            inner.generation += 1;
            inner.phase = ScanPhase::Starting;
            inner.generation
        };
        self.shared.publish();

        info!(
            "Acquiring {} at {}x{}",
            self.media.name(),
            self.constraints.width,
            self.constraints.height
        );
        match self.media.acquire(self.constraints).await {
            Ok(handle) => self.install(generation, handle).await,
            Err(err) => {
                warn!("Camera acquisition failed: {}", err);
                {
                    let mut inner = self.shared.inner.lock().unwrap();
                    if inner.generation == generation {
                        inner.phase = ScanPhase::Idle;
                    }
                }
                self.shared.publish();
                Err(err)
            }
        }
    }

    async fn install(&self, generation: u64, handle: MediaHandle) -> Result<(), AcquireError> {
        let installed = {
            let mut inner = self.shared.inner.lock().unwrap();
            if inner.generation != generation || inner.phase != ScanPhase::Starting {
                false
            } else {
                let cancel = CancellationToken::new();
                inner.handle = Some(handle.clone());
                inner.cancel = Some(cancel.clone());
                inner.phase = ScanPhase::Active;
                inner.tick_task = Some(tokio::spawn(tick_loop(
                    Arc::clone(&self.media),
                    Arc::clone(&self.detector),
                    Arc::clone(&self.shared),
                    handle.clone(),
                    self.interval,
                    cancel,
                )));
                true
            }
        };
        if !installed {
            // A stop() superseded this start while the grant was in
            // flight; the camera must not stay on.
            info!(
                "Discarding superseded camera grant, releasing handle {}",
                handle.id()
            );
            self.media.release(&handle).await;
            return Ok(());
        }
        self.shared.publish();
        info!("Scanner active, tick interval {:?}", self.interval);
        Ok(())
    }

    /// Halt the detection loop and release the camera.
    ///
    /// Idempotent: a no-op when idle, and callable from teardown paths that
    /// do not know the current phase. The timer is disarmed before the
    /// handle is released so no tick fires against a released camera.
    pub async fn stop(&self) {
        let teardown = {
            let mut inner = self.shared.inner.lock().unwrap();
            match inner.phase {
                ScanPhase::Idle | ScanPhase::Stopping => {
                    debug!("stop() ignored: scanner is {:?}", inner.phase);
                    return;
                }
                ScanPhase::Starting => {
                    info!("Stop requested during acquisition; superseding the pending grant");
                    inner.generation += 1;
                    inner.phase = ScanPhase::Idle;
                    inner.reset_session();
                    None
                }
                ScanPhase::Active => {
                    inner.generation += 1;
                    inner.phase = ScanPhase::Stopping;
                    Some((
                        inner.handle.take(),
                        inner.cancel.take(),
                        inner.tick_task.take(),
                    ))
                }
            }
        };

        let Some((handle, cancel, task)) = teardown else {
            self.shared.publish();
            return;
        };
        self.shared.publish();

        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(task) = task {
            if let Err(err) = task.await {
                warn!("Tick loop ended abnormally: {}", err);
            }
        }
        if let Some(handle) = handle {
            self.media.release(&handle).await;
        }

        {
            let mut inner = self.shared.inner.lock().unwrap();
            inner.phase = ScanPhase::Idle;
            inner.reset_session();
        }
        self.shared.publish();
        info!("Scanner stopped");
    }
}

impl Drop for DetectionScheduler {
    fn drop(&mut self) {
        let (handle, cancel) = {
            let mut inner = self.shared.inner.lock().unwrap();
            inner.phase = ScanPhase::Idle;
            (inner.handle.take(), inner.cancel.take())
        };
        if let Some(cancel) = cancel {
            cancel.cancel();
        }
        if let Some(handle) = handle {
            // Drop cannot await; hand the release to the runtime if one is
            // still around. Release is idempotent, so overlapping with an
            // explicit stop is harmless.
            match tokio::runtime::Handle::try_current() {
                Ok(runtime) => {
                    let media = Arc::clone(&self.media);
                    runtime.spawn(async move { media.release(&handle).await });
                }
                Err(_) => warn!(
                    "Scanner dropped outside a runtime; camera handle {} leaked",
                    handle.id()
                ),
            }
        }
    }
}

async fn tick_loop(
    media: Arc<dyn MediaSource>,
    detector: Arc<dyn Detector>,
    shared: Arc<Shared>,
    handle: MediaHandle,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticks = tokio::time::interval(period);
    // First tick fires immediately so the presenter is never blank for a
    // full period; a classification still in flight when the next deadline
    // passes coalesces instead of stacking.
    ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticks.tick() => {
                run_tick(&media, &detector, &shared, &handle, &cancel).await;
            }
        }
    }
    debug!("Tick loop closed for handle {}", handle.id());
}

async fn run_tick(
    media: &Arc<dyn MediaSource>,
    detector: &Arc<dyn Detector>,
    shared: &Shared,
    handle: &MediaHandle,
    cancel: &CancellationToken,
) {
    let outcome = classify_current_frame(media, detector, handle).await;
    if cancel.is_cancelled() {
        // Teardown began while classification was in flight.
        return;
    }
    match outcome {
        Ok(result) => {
            let (width, height) = media
                .current_dimensions(handle)
                .await
                .unwrap_or_else(|| handle.acquired_dimensions());
            let mut inner = shared.inner.lock().unwrap();
            debug!(
                "Tick: {} at {}% ({:?})",
                result.label, result.confidence_percent, result.severity
            );
            inner.scan_count += 1;
            if result.severity.is_detection() {
                inner.detection_count += 1;
            }
            inner.overlay = OverlayGeometry::compute(width, height, Some(&result));
            inner.last_result = Some(result);
            inner.advisory = None;
        }
        Err(err) => {
            warn!("Tick failed, keeping last good result: {}", err);
            let mut inner = shared.inner.lock().unwrap();
            inner.advisory = Some(err.to_string());
        }
    }
    shared.publish();
}

async fn classify_current_frame(
    media: &Arc<dyn MediaSource>,
    detector: &Arc<dyn Detector>,
    handle: &MediaHandle,
) -> Result<DetectionResult, ScanError> {
    let frame = media.grab_frame(handle).await?;
    Ok(detector.classify(&frame).await?)
}

pub struct DetectionSchedulerBuilder {
    configuration: Configuration,
    media: Option<Arc<dyn MediaSource>>,
    detector: Option<Arc<dyn Detector>>,
}

impl DetectionSchedulerBuilder {
    pub fn new(configuration: Configuration) -> Self {
        Self {
            configuration,
            media: None,
            detector: None,
        }
    }

    // Adjusts the tick interval, this will override the configuration.
    pub fn tick_interval_ms(mut self, tick_interval_ms: u64) -> Self {
        self.configuration.tick_interval_ms = tick_interval_ms;
        self
    }

    pub fn media(mut self, media: Arc<dyn MediaSource>) -> Self {
        self.media = Some(media);
        self
    }

    pub fn detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn build(self) -> Result<DetectionScheduler, ScanError> {
        let media = self
            .media
            .ok_or(ScanError::Setup("Media source not set".to_string()))?;
        let detector = self
            .detector
            .ok_or(ScanError::Setup("Detector not set".to_string()))?;
        Ok(DetectionScheduler::new(media, detector, self.configuration))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Frame;
    use crate::detect::{MockDetector, Severity};
    use crate::error::DetectorError;
    use crate::media::SimulatedCamera;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    struct ScriptedDetector {
        script: Mutex<VecDeque<Result<DetectionResult, DetectorError>>>,
        calls: AtomicUsize,
    }

    impl ScriptedDetector {
        fn new(script: Vec<Result<DetectionResult, DetectorError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait::async_trait]
    impl Detector for ScriptedDetector {
        async fn classify(&self, _frame: &Frame) -> Result<DetectionResult, DetectorError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Ok(healthy_leaf()))
        }

        fn name(&self) -> &'static str {
            "scripted-detector"
        }
    }

    fn leaf_rust() -> DetectionResult {
        DetectionResult::new("Leaf Rust", 88, Severity::High, "#ef4444")
    }

    fn powdery_mildew() -> DetectionResult {
        DetectionResult::new("Powdery Mildew", 92, Severity::Medium, "#f59e0b")
    }

    fn healthy_leaf() -> DetectionResult {
        DetectionResult::new("Healthy Leaf", 95, Severity::None, "#10b981")
    }

    async fn wait_for(
        rx: &mut watch::Receiver<ScanSessionState>,
        what: &str,
        predicate: impl Fn(&ScanSessionState) -> bool,
    ) -> ScanSessionState {
        tokio::time::timeout(Duration::from_secs(120), async {
            loop {
                {
                    let state = rx.borrow_and_update().clone();
                    if predicate(&state) {
                        return state;
                    }
                }
                rx.changed().await.expect("state channel closed");
            }
        })
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {}", what))
    }

    #[tokio::test(start_paused = true)]
    async fn start_is_idempotent_without_an_intervening_stop() {
        let camera = Arc::new(SimulatedCamera::new());
        let scheduler = DetectionScheduler::builder(Configuration::default())
            .media(camera.clone())
            .detector(Arc::new(MockDetector))
            .build()
            .unwrap();

        scheduler.start().await.unwrap();
        scheduler.start().await.unwrap();
        assert_eq!(camera.acquisitions(), 1);

        scheduler.stop().await;
        assert_eq!(camera.releases(), 1);
    }

    #[tokio::test]
    async fn stop_before_any_start_is_a_noop() {
        let camera = Arc::new(SimulatedCamera::new());
        let scheduler = DetectionScheduler::builder(Configuration::default())
            .media(camera.clone())
            .detector(Arc::new(MockDetector))
            .build()
            .unwrap();

        scheduler.stop().await;
        scheduler.stop().await;
        let state = scheduler.snapshot();
        assert_eq!(state.phase, ScanPhase::Idle);
        assert_eq!(camera.releases(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn session_publishes_results_then_clears_on_stop() {
        let camera = Arc::new(SimulatedCamera::new());
        let detector = Arc::new(ScriptedDetector::new(vec![Ok(leaf_rust())]));
        let scheduler = DetectionScheduler::builder(Configuration::default())
            .media(camera.clone())
            .detector(detector.clone())
            .build()
            .unwrap();
        let mut rx = scheduler.subscribe();

        scheduler.start().await.unwrap();
        let active = wait_for(&mut rx, "first tick", |s| s.scan_count == 1).await;
        assert_eq!(active.phase, ScanPhase::Active);
        let result = active.last_result.expect("result after first tick");
        assert_eq!(result.label, "Leaf Rust");
        assert_eq!(result.severity, Severity::High);
        assert!(!active.overlay.is_empty());
        assert_eq!(active.detection_count, 1);

        scheduler.stop().await;
        let idle = wait_for(&mut rx, "teardown", |s| {
            s.phase == ScanPhase::Idle && s.scan_count == 0
        })
        .await;
        assert!(idle.overlay.is_empty());
        assert!(idle.last_result.is_none());
        assert_eq!(idle.detection_count, 0);
        assert_eq!(camera.acquisitions(), 1);
        assert_eq!(camera.releases(), 1);

        // The disarmed timer must not tick again.
        let calls_after_stop = detector.calls();
        tokio::time::advance(Duration::from_secs(30)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(detector.calls(), calls_after_stop);
        assert_eq!(scheduler.snapshot().phase, ScanPhase::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_during_acquisition_supersedes_the_grant() {
        let gate = Arc::new(Notify::new());
        let camera = Arc::new(SimulatedCamera::new().with_acquire_gate(gate.clone()));
        let detector = Arc::new(ScriptedDetector::new(vec![]));
        let scheduler = Arc::new(
            DetectionScheduler::builder(Configuration::default())
                .media(camera.clone())
                .detector(detector.clone())
                .build()
                .unwrap(),
        );
        let mut rx = scheduler.subscribe();

        let starter = {
            let scheduler = Arc::clone(&scheduler);
            tokio::spawn(async move { scheduler.start().await })
        };
        wait_for(&mut rx, "acquisition in flight", |s| {
            s.phase == ScanPhase::Starting
        })
        .await;

        scheduler.stop().await;
        assert_eq!(scheduler.snapshot().phase, ScanPhase::Idle);

        // Permission arrives after the user already said stop.
        gate.notify_one();
        starter.await.unwrap().unwrap();

        assert_eq!(camera.acquisitions(), 1);
        assert_eq!(camera.releases(), 1);
        assert_eq!(scheduler.snapshot().phase, ScanPhase::Idle);
        assert_eq!(detector.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn detector_failure_keeps_the_session_active() {
        let camera = Arc::new(SimulatedCamera::new());
        let detector = Arc::new(ScriptedDetector::new(vec![
            Ok(leaf_rust()),
            Err(DetectorError::Inference("model crashed".to_string())),
            Ok(powdery_mildew()),
        ]));
        let scheduler = DetectionScheduler::builder(Configuration::default())
            .media(camera.clone())
            .detector(detector.clone())
            .build()
            .unwrap();
        let mut rx = scheduler.subscribe();

        scheduler.start().await.unwrap();
        wait_for(&mut rx, "first tick", |s| s.scan_count == 1).await;

        let advisory = wait_for(&mut rx, "advisory", |s| s.advisory.is_some()).await;
        assert_eq!(advisory.phase, ScanPhase::Active);
        assert_eq!(advisory.scan_count, 1);
        let retained = advisory.last_result.expect("last good result retained");
        assert_eq!(retained.label, "Leaf Rust");
        assert!(advisory.advisory.unwrap().contains("model crashed"));

        let recovered = wait_for(&mut rx, "recovery tick", |s| s.scan_count == 2).await;
        assert!(recovered.advisory.is_none());
        assert_eq!(recovered.last_result.unwrap().label, "Powdery Mildew");
        assert_eq!(recovered.detection_count, 2);

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn acquisition_failure_returns_to_idle_and_allows_retry() {
        let camera = Arc::new(SimulatedCamera::new().with_permission_denied());
        let scheduler = DetectionScheduler::builder(Configuration::default())
            .media(camera.clone())
            .detector(Arc::new(MockDetector))
            .build()
            .unwrap();

        let err = scheduler.start().await.unwrap_err();
        assert_eq!(err, AcquireError::PermissionDenied);
        assert_eq!(scheduler.snapshot().phase, ScanPhase::Idle);

        // Not stuck: the retry attempts a fresh acquisition instead of
        // being swallowed as a non-idle no-op.
        let err = scheduler.start().await.unwrap_err();
        assert_eq!(err, AcquireError::PermissionDenied);
        assert_eq!(camera.acquisitions(), 0);
        assert_eq!(camera.releases(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn overlay_follows_renegotiated_dimensions() {
        let camera = Arc::new(SimulatedCamera::new());
        let detector = Arc::new(ScriptedDetector::new(vec![Ok(leaf_rust())]));
        let scheduler = DetectionScheduler::builder(Configuration::default())
            .media(camera.clone())
            .detector(detector)
            .build()
            .unwrap();
        let mut rx = scheduler.subscribe();

        scheduler.start().await.unwrap();
        let first = wait_for(&mut rx, "first tick", |s| s.scan_count == 1).await;
        let wide = first.overlay.brackets[0].points[1];
        assert_eq!((wide.x, wide.y), (440.0, 210.0));

        camera.renegotiate_dimensions(640, 480);
        let second = wait_for(&mut rx, "tick after renegotiation", |s| s.scan_count == 2).await;
        let narrow = second.overlay.brackets[0].points[1];
        assert_eq!((narrow.x, narrow.y), (120.0, 90.0));

        scheduler.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_the_scheduler_releases_the_camera() {
        let camera = Arc::new(SimulatedCamera::new());
        let scheduler = DetectionScheduler::builder(Configuration::default())
            .media(camera.clone())
            .detector(Arc::new(MockDetector))
            .build()
            .unwrap();
        let mut rx = scheduler.subscribe();

        scheduler.start().await.unwrap();
        wait_for(&mut rx, "first tick", |s| s.scan_count >= 1).await;

        drop(scheduler);
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(camera.releases(), 1);
    }
}
