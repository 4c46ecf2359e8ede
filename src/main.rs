use std::sync::Arc;

use tracing::{info, Level};

use leafscan::config::Configuration;
use leafscan::detect::MockDetector;
use leafscan::error::ScanError;
use leafscan::media::SimulatedCamera;
use leafscan::scanner::DetectionScheduler;

fn init_logging() {
    tracing_subscriber::fmt().with_max_level(Level::INFO).init();
}

#[tokio::main]
async fn main() -> Result<(), ScanError> {
    init_logging();
    let configuration = Configuration::load()?;
    let demo_ticks = configuration.demo_ticks;

    let camera = Arc::new(SimulatedCamera::new());
    let scheduler = DetectionScheduler::builder(configuration)
        .media(camera)
        .detector(Arc::new(MockDetector))
        .build()?;
    let mut states = scheduler.subscribe();

    scheduler.start().await?;

    // Follow the session until the requested number of scans came in.
    let summary = loop {
        states.changed().await.map_err(|e| {
            ScanError::Setup(format!("state channel closed before session end: {e}"))
        })?;
        let state = states.borrow_and_update().clone();
        if let Some(result) = &state.last_result {
            info!(
                "Scan {}: {} at {}% ({:?}), {} recommendation(s)",
                state.scan_count,
                result.label,
                result.confidence_percent,
                result.severity,
                result.recommendations.len()
            );
        }
        if state.scan_count >= demo_ticks as u64 {
            break state;
        }
    };

    scheduler.stop().await;

    let report = serde_json::to_string_pretty(&summary)
        .map_err(|e| ScanError::Setup(format!("failed to serialize session report: {e}")))?;
    info!("Session report:\n{}", report);
    Ok(())
}
