use std::collections::HashSet;
use std::ops::ControlFlow;
use std::time::Duration;

use anyhow::Result;
use serde::Serialize;
use tracing::info;

use crate::analyzer::Detector;
use crate::render::{FlaggedPoint, Frame, FrameSink};
use crate::types::Sample;

/// Flagged points compared against the generator's injected outliers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub samples: usize,
    pub flagged: usize,
    pub injected: usize,
    pub true_positives: usize,
    pub false_positives: usize,
    pub missed: usize,
}

impl RunSummary {
    pub fn precision(&self) -> Option<f64> {
        (self.flagged > 0).then(|| self.true_positives as f64 / self.flagged as f64)
    }

    pub fn recall(&self) -> Option<f64> {
        (self.injected > 0).then(|| self.true_positives as f64 / self.injected as f64)
    }
}

/// Feeds samples through a detector one step at a time and hands each step
/// to a frame sink.
pub struct Driver {
    detector: Box<dyn Detector>,
    sink: Box<dyn FrameSink>,
    frame_delay: Duration,
}

impl Driver {
    pub fn new(detector: Box<dyn Detector>, sink: Box<dyn FrameSink>, frame_delay: Duration) -> Self {
        Self { detector, sink, frame_delay }
    }

    pub fn run(&mut self, samples: &[Sample]) -> Result<RunSummary> {
        let mut flagged_indices = HashSet::new();
        let mut observed = 0;

        for (step, sample) in samples.iter().enumerate() {
            let anomalies = self.detector.observe(sample.value);
            observed = step + 1;

            // Window position 0 holds the sample that arrived len-1 steps ago
            let window_start = observed - self.detector.window().len();
            let flagged: Vec<FlaggedPoint> = anomalies
                .into_iter()
                .map(|anomaly| FlaggedPoint {
                    stream_index: window_start + anomaly.window_index,
                    anomaly,
                })
                .collect();
            flagged_indices.extend(flagged.iter().map(|p| p.stream_index));

            let frame = Frame {
                step,
                samples: &samples[..observed],
                flagged: &flagged,
                stats: self.detector.stats(),
            };
            if let ControlFlow::Break(()) = self.sink.draw(&frame)? {
                info!(step, "Stopped by sink");
                break;
            }

            if !self.frame_delay.is_zero() && observed < samples.len() {
                std::thread::sleep(self.frame_delay);
            }
        }

        let summary = summarize(&samples[..observed], &flagged_indices);
        info!(
            samples = summary.samples,
            flagged = summary.flagged,
            injected = summary.injected,
            true_positives = summary.true_positives,
            false_positives = summary.false_positives,
            missed = summary.missed,
            "Run complete"
        );

        self.sink.finish(&summary)?;
        Ok(summary)
    }
}

fn summarize(samples: &[Sample], flagged: &HashSet<usize>) -> RunSummary {
    let injected = samples.iter().filter(|s| s.injected).count();
    let true_positives = samples
        .iter()
        .filter(|s| s.injected && flagged.contains(&s.index))
        .count();

    RunSummary {
        samples: samples.len(),
        flagged: flagged.len(),
        injected,
        true_positives,
        false_positives: flagged.len() - true_positives,
        missed: injected - true_positives,
    }
}
