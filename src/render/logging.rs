use std::ops::ControlFlow;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::driver::RunSummary;
use crate::types::Severity;
use super::{Frame, FrameSink};

/// Headless sink that reports flagged points through `tracing`.
#[derive(Default)]
pub struct LogSink {
    frames: usize,
}

impl LogSink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FrameSink for LogSink {
    fn name(&self) -> &str { "log" }

    fn draw(&mut self, frame: &Frame<'_>) -> Result<ControlFlow<()>> {
        self.frames += 1;

        if let Some(sample) = frame.current() {
            debug!(
                step = frame.step,
                value = sample.value,
                mean = frame.stats.map(|s| s.mean),
                std_dev = frame.stats.map(|s| s.std_dev),
                "Frame"
            );
        }

        for point in frame.flagged {
            let a = &point.anomaly;
            match a.severity {
                Severity::Critical => warn!(
                    index = point.stream_index,
                    value = a.value,
                    z_score = a.z_score,
                    severity = %a.severity,
                    "Anomaly detected"
                ),
                Severity::Warn => info!(
                    index = point.stream_index,
                    value = a.value,
                    z_score = a.z_score,
                    severity = %a.severity,
                    "Anomaly detected"
                ),
            }
        }

        Ok(ControlFlow::Continue(()))
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<()> {
        debug!(frames = self.frames, flagged = summary.flagged, "Log sink finished");
        Ok(())
    }
}
