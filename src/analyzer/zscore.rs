use anyhow::{ensure, Result};

use crate::config::DetectorConfig;
use crate::stats::WindowStats;
use crate::types::Anomaly;
use crate::window::Window;
use super::{flag_newest, Detector};

/// Z-Score based anomaly detection.
/// Recomputes mean and population std-dev over the full window on every
/// step, the newest value included.
pub struct ZScoreDetector {
    window: Window,
    threshold: f64,
    stats: Option<WindowStats>,
}

impl ZScoreDetector {
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        ensure!(config.window_size > 0, "window size must be at least 1");
        Ok(Self {
            window: Window::new(config.window_size),
            threshold: config.threshold,
            stats: None,
        })
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl Detector for ZScoreDetector {
    fn name(&self) -> &str { "zscore" }

    fn observe(&mut self, value: f64) -> Vec<Anomaly> {
        self.window.push(value);

        if !self.window.is_full() {
            self.stats = None;
            return Vec::new(); // Not enough history
        }

        self.stats = WindowStats::from_values(self.window.iter());
        match &self.stats {
            Some(stats) => flag_newest(&self.window, stats, self.threshold),
            None => Vec::new(),
        }
    }

    fn stats(&self) -> Option<WindowStats> {
        self.stats
    }

    fn window(&self) -> &Window {
        &self.window
    }

    fn reset(&mut self) {
        self.window.clear();
        self.stats = None;
    }
}
