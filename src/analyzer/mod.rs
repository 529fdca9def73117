pub mod running;
pub mod zscore;

use anyhow::Result;

use crate::config::{DetectorConfig, DetectorMode};
use crate::stats::WindowStats;
use crate::types::{Anomaly, Severity};
use crate::window::Window;

pub use running::RunningZScoreDetector;
pub use zscore::ZScoreDetector;

/// Trait for sliding-window anomaly detectors.
///
/// A detector is fed one value per step and reports which window positions
/// are outliers against the statistics of the current window.
pub trait Detector: Send {
    /// Human-readable name for this detector
    fn name(&self) -> &str;

    /// Push a value and return anomalies flagged at this step
    fn observe(&mut self, value: f64) -> Vec<Anomaly>;

    /// Statistics from the last full-window step, if any
    fn stats(&self) -> Option<WindowStats>;

    /// Current window contents
    fn window(&self) -> &Window;

    /// Drop all history
    fn reset(&mut self);
}

/// Create the detector selected by configuration
pub fn create_detector(config: &DetectorConfig) -> Result<Box<dyn Detector>> {
    let detector: Box<dyn Detector> = match config.mode {
        DetectorMode::Recompute => Box::new(ZScoreDetector::new(config)?),
        DetectorMode::Running => Box::new(RunningZScoreDetector::new(config)?),
    };

    tracing::info!(
        detector = detector.name(),
        window_size = config.window_size,
        threshold = config.threshold,
        "Initialized detector"
    );
    Ok(detector)
}

/// Score the newest window position and flag it when past the threshold.
///
/// Older positions were scored against an earlier window when they arrived
/// and are not revisited.
fn flag_newest(window: &Window, stats: &WindowStats, threshold: f64) -> Vec<Anomaly> {
    let Some(value) = window.latest() else {
        return Vec::new();
    };
    let Some(z_score) = stats.z_score(value) else {
        return Vec::new(); // No variation
    };

    match Severity::classify(z_score, threshold) {
        Some(severity) => vec![Anomaly {
            window_index: window.len() - 1,
            value,
            z_score,
            severity,
        }],
        None => Vec::new(),
    }
}
