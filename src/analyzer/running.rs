use anyhow::{ensure, Result};

use crate::config::DetectorConfig;
use crate::stats::WindowStats;
use crate::types::Anomaly;
use crate::window::Window;
use super::{flag_newest, Detector};

/// Z-Score detection with running window statistics.
///
/// Mean and the sum of squared deviations are updated in O(1) per step with
/// a sliding Welford update: add while filling, swap the evicted value for
/// the new one once full. Results match [`super::ZScoreDetector`] up to
/// floating-point rounding. The accumulators are rebuilt from the window
/// once per `window_size` steps, and immediately whenever `m2` falls far
/// below the largest value it held since the last rebuild: the rounding
/// error of each update scales with that peak, so a large value leaving the
/// window would otherwise leave the small remainder dominated by error.
pub struct RunningZScoreDetector {
    window: Window,
    threshold: f64,
    mean: f64,
    m2: f64,
    m2_peak: f64,
    steps_since_resync: usize,
    stats: Option<WindowStats>,
}

/// Rebuild once `m2` drops below this fraction of its peak.
const RESYNC_DROP_RATIO: f64 = 1e-3;

impl RunningZScoreDetector {
    pub fn new(config: &DetectorConfig) -> Result<Self> {
        ensure!(config.window_size > 0, "window size must be at least 1");
        Ok(Self {
            window: Window::new(config.window_size),
            threshold: config.threshold,
            mean: 0.0,
            m2: 0.0,
            m2_peak: 0.0,
            steps_since_resync: 0,
            stats: None,
        })
    }

    fn add(&mut self, value: f64) {
        let n = self.window.len() as f64;
        let delta = value - self.mean;
        self.mean += delta / n;
        self.m2 += delta * (value - self.mean);
    }

    fn replace(&mut self, evicted: f64, value: f64) {
        let n = self.window.len() as f64;
        let old_mean = self.mean;
        let delta = value - evicted;
        self.mean += delta / n;
        self.m2 += delta * (value - self.mean + evicted - old_mean);
    }

    fn resync(&mut self) {
        match WindowStats::from_values(self.window.iter()) {
            Some(stats) => {
                self.mean = stats.mean;
                self.m2 = stats.std_dev.powi(2) * stats.count as f64;
            }
            None => {
                self.mean = 0.0;
                self.m2 = 0.0;
            }
        }
        self.m2_peak = self.m2;
        self.steps_since_resync = 0;
    }

    /// True when cancellation may have eaten the precision of `m2`.
    fn lost_precision(&mut self) -> bool {
        self.m2_peak = self.m2_peak.max(self.m2);
        self.m2 < self.m2_peak * RESYNC_DROP_RATIO
    }

    fn current_stats(&self) -> WindowStats {
        let count = self.window.len();
        WindowStats {
            mean: self.mean,
            std_dev: (self.m2.max(0.0) / count as f64).sqrt(),
            count,
        }
    }
}

impl Detector for RunningZScoreDetector {
    fn name(&self) -> &str { "zscore-running" }

    fn observe(&mut self, value: f64) -> Vec<Anomaly> {
        match self.window.push(value) {
            Some(evicted) => self.replace(evicted, value),
            None => self.add(value),
        }
        if self.lost_precision() {
            self.resync();
        }

        if !self.window.is_full() {
            self.stats = None;
            return Vec::new(); // Not enough history
        }

        self.steps_since_resync += 1;
        if self.steps_since_resync >= self.window.capacity() {
            self.resync();
        }

        let stats = self.current_stats();
        self.stats = Some(stats);
        flag_newest(&self.window, &stats, self.threshold)
    }

    fn stats(&self) -> Option<WindowStats> {
        self.stats
    }

    fn window(&self) -> &Window {
        &self.window
    }

    fn reset(&mut self) {
        self.window.clear();
        self.mean = 0.0;
        self.m2 = 0.0;
        self.m2_peak = 0.0;
        self.steps_since_resync = 0;
        self.stats = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ZScoreDetector;
    use crate::config::StreamConfig;
    use crate::generator::StreamGenerator;

    fn config(window_size: usize) -> DetectorConfig {
        DetectorConfig { window_size, ..DetectorConfig::default() }
    }

    #[test]
    fn test_matches_recompute_on_generated_stream() {
        let stream_config = StreamConfig { seed: Some(2024), ..StreamConfig::default() };
        let samples = StreamGenerator::new(&stream_config).unwrap().generate(1_000);

        let mut running = RunningZScoreDetector::new(&config(50)).unwrap();
        let mut recompute = ZScoreDetector::new(&config(50)).unwrap();

        for s in &samples {
            let a = running.observe(s.value);
            let b = recompute.observe(s.value);

            let idx_a: Vec<usize> = a.iter().map(|x| x.window_index).collect();
            let idx_b: Vec<usize> = b.iter().map(|x| x.window_index).collect();
            assert_eq!(idx_a, idx_b, "flags differ at sample {}", s.index);

            match (running.stats(), recompute.stats()) {
                (Some(ra), Some(rb)) => {
                    assert!((ra.mean - rb.mean).abs() < 1e-9);
                    assert!((ra.std_dev - rb.std_dev).abs() < 1e-9);
                    let za = ra.z_score(s.value).unwrap();
                    let zb = rb.z_score(s.value).unwrap();
                    assert!((za - zb).abs() < 1e-9, "z {} vs {}", za, zb);
                }
                (None, None) => {}
                other => panic!("stats availability differs at {}: {:?}", s.index, other),
            }
        }
    }

    #[test]
    fn test_matches_recompute_after_spike_leaves_window() {
        let base = |i: usize| 3.3 + (i % 3) as f64;
        let mut values: Vec<f64> = (0..10).map(base).collect();
        values.push(1e9);
        values.extend((0..150).map(base));

        let mut running = RunningZScoreDetector::new(&config(50)).unwrap();
        let mut recompute = ZScoreDetector::new(&config(50)).unwrap();

        for (step, &v) in values.iter().enumerate() {
            let a = running.observe(v);
            let b = recompute.observe(v);
            assert_eq!(a.len(), b.len(), "flags differ at step {}", step);

            let (Some(ra), Some(rb)) = (running.stats(), recompute.stats()) else {
                continue;
            };
            let scale = rb.std_dev.max(1.0);
            assert!((ra.mean - rb.mean).abs() < 1e-9 * scale, "mean at step {}", step);
            assert!((ra.std_dev - rb.std_dev).abs() < 1e-9 * scale, "std at step {}", step);
            let za = ra.z_score(v).unwrap();
            let zb = rb.z_score(v).unwrap();
            assert!((za - zb).abs() < 1e-9, "z {} vs {} at step {}", za, zb, step);
        }

        // Spike evicted at step 60; the window is back to the small base values
        let stats = running.stats().unwrap();
        assert!(stats.std_dev < 1.0);
    }

    #[test]
    fn test_flat_window_flags_nothing() {
        let mut d = RunningZScoreDetector::new(&config(50)).unwrap();
        for _ in 0..200 {
            assert!(d.observe(-3.0).is_empty());
        }
    }

    #[test]
    fn test_spike_after_flat_window_is_flagged() {
        let mut d = RunningZScoreDetector::new(&config(50)).unwrap();
        for _ in 0..49 {
            assert!(d.observe(0.0).is_empty());
        }
        let flagged = d.observe(1_000.0);
        assert_eq!(flagged.len(), 1);
        assert_eq!(flagged[0].window_index, 49);
    }

    #[test]
    fn test_ramp_stats() {
        let mut d = RunningZScoreDetector::new(&config(50)).unwrap();
        for i in 1..=50 {
            d.observe(i as f64);
        }
        let stats = d.stats().unwrap();
        assert!((stats.mean - 25.5).abs() < 1e-12);
        let expected_std = ((50.0f64 * 50.0 - 1.0) / 12.0).sqrt();
        assert!((stats.std_dev - expected_std).abs() < 1e-9);
    }

    #[test]
    fn test_reset_clears_accumulators() {
        let mut d = RunningZScoreDetector::new(&config(3)).unwrap();
        for v in [10.0, 20.0, 30.0, 40.0] {
            d.observe(v);
        }
        d.reset();
        for v in [1.0, 1.0, 1.0] {
            d.observe(v);
        }
        let stats = d.stats().unwrap();
        assert_eq!(stats.mean, 1.0);
        assert!(stats.is_degenerate());
    }
}
