use anyhow::{ensure, Result};
use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::StreamConfig;
use crate::types::Sample;

/// Synthetic stream: a sine baseline with uniform noise and injected outliers.
///
/// The generator owns its random source. With a seed the stream is
/// reproducible; without one it is drawn from OS entropy.
pub struct StreamGenerator {
    rng: StdRng,
    amplitude: f64,
    frequency: f64,
    noise: Uniform<f64>,
    anomaly: Uniform<f64>,
    anomaly_probability: f64,
    next_index: usize,
}

impl StreamGenerator {
    pub fn new(config: &StreamConfig) -> Result<Self> {
        check_range("noise", config.noise_min, config.noise_max)?;
        check_range("anomaly", config.anomaly_min, config.anomaly_max)?;
        ensure!(
            (0.0..=1.0).contains(&config.anomaly_probability),
            "anomaly probability out of range: {}",
            config.anomaly_probability
        );

        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            rng,
            amplitude: config.amplitude,
            frequency: config.frequency,
            noise: Uniform::new_inclusive(config.noise_min, config.noise_max),
            anomaly: Uniform::new_inclusive(config.anomaly_min, config.anomaly_max),
            anomaly_probability: config.anomaly_probability,
            next_index: 0,
        })
    }

    /// Deterministic part of the signal at index `i`.
    pub fn baseline(&self, i: usize) -> f64 {
        self.amplitude * (self.frequency * i as f64).sin()
    }

    /// Draw the next sample. Noise is always drawn before the outlier roll so
    /// a given seed yields the same sequence regardless of outcomes.
    pub fn next_sample(&mut self) -> Sample {
        let index = self.next_index;
        self.next_index += 1;

        let value = self.baseline(index) + self.noise.sample(&mut self.rng);

        if self.rng.gen::<f64>() < self.anomaly_probability {
            Sample {
                index,
                value: self.anomaly.sample(&mut self.rng),
                injected: true,
            }
        } else {
            Sample { index, value, injected: false }
        }
    }

    /// Generate exactly `n` samples.
    pub fn generate(&mut self, n: usize) -> Vec<Sample> {
        (0..n).map(|_| self.next_sample()).collect()
    }
}

impl Iterator for StreamGenerator {
    type Item = Sample;

    fn next(&mut self) -> Option<Sample> {
        Some(self.next_sample())
    }
}

/// `Uniform` panics on non-finite bounds or a width that overflows.
fn check_range(name: &str, min: f64, max: f64) -> Result<()> {
    ensure!(
        min.is_finite() && max.is_finite() && (max - min).is_finite(),
        "{} range must be finite: [{}, {}]",
        name,
        min,
        max
    );
    ensure!(min <= max, "{} range is inverted: [{}, {}]", name, min, max);
    Ok(())
}

/// Project samples to their raw values.
pub fn values(samples: &[Sample]) -> Vec<f64> {
    samples.iter().map(|s| s.value).collect()
}
