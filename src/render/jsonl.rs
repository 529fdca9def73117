use std::io::Write;
use std::ops::ControlFlow;

use anyhow::{Context, Result};
use serde::Serialize;

use crate::driver::RunSummary;
use crate::stats::WindowStats;
use super::{FlaggedPoint, Frame, FrameSink};

/// Writes one JSON object per frame, then a summary object.
pub struct JsonlSink<W: Write> {
    out: W,
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum Record<'a> {
    Frame {
        step: usize,
        value: f64,
        injected: bool,
        #[serde(skip_serializing_if = "Option::is_none")]
        stats: Option<WindowStats>,
        flagged: &'a [FlaggedPoint],
    },
    Summary {
        #[serde(flatten)]
        summary: &'a RunSummary,
        #[serde(skip_serializing_if = "Option::is_none")]
        precision: Option<f64>,
        #[serde(skip_serializing_if = "Option::is_none")]
        recall: Option<f64>,
    },
}

impl<W: Write> JsonlSink<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_record(&mut self, record: &Record<'_>) -> Result<()> {
        serde_json::to_writer(&mut self.out, record).context("Failed to encode record")?;
        self.out.write_all(b"\n").context("Failed to write record")?;
        Ok(())
    }
}

impl<W: Write> FrameSink for JsonlSink<W> {
    fn name(&self) -> &str { "jsonl" }

    fn draw(&mut self, frame: &Frame<'_>) -> Result<ControlFlow<()>> {
        let Some(sample) = frame.current() else {
            return Ok(ControlFlow::Continue(()));
        };

        self.write_record(&Record::Frame {
            step: frame.step,
            value: sample.value,
            injected: sample.injected,
            stats: frame.stats,
            flagged: frame.flagged,
        })?;
        Ok(ControlFlow::Continue(()))
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<()> {
        self.write_record(&Record::Summary {
            summary,
            precision: summary.precision(),
            recall: summary.recall(),
        })?;
        self.out.flush().context("Failed to flush output")?;
        Ok(())
    }
}
