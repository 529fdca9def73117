pub mod jsonl;
pub mod logging;
pub mod terminal;

use std::ops::ControlFlow;

use anyhow::Result;
use serde::Serialize;

use crate::config::{RenderConfig, SinkKind};
use crate::driver::RunSummary;
use crate::stats::WindowStats;
use crate::types::{Anomaly, Sample};

/// An anomaly located in the stream rather than the window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FlaggedPoint {
    pub stream_index: usize,
    #[serde(flatten)]
    pub anomaly: Anomaly,
}

/// Everything a sink needs to draw one step
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub step: usize,
    /// Every sample observed so far, this step's included
    pub samples: &'a [Sample],
    /// Anomalies flagged at this step
    pub flagged: &'a [FlaggedPoint],
    pub stats: Option<WindowStats>,
}

impl Frame<'_> {
    pub fn current(&self) -> Option<&Sample> {
        self.samples.last()
    }
}

/// Axis bounds for chart output
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChartBounds {
    pub x: [f64; 2],
    pub y: [f64; 2],
}

impl ChartBounds {
    pub fn new(stream_length: usize, config: &RenderConfig) -> Self {
        Self {
            x: [0.0, stream_length as f64],
            y: [config.y_min, config.y_max],
        }
    }
}

/// Trait for frame output targets
pub trait FrameSink {
    /// Sink name
    fn name(&self) -> &str;

    /// Draw one step. `Break` asks the driver to stop early.
    fn draw(&mut self, frame: &Frame<'_>) -> Result<ControlFlow<()>>;

    /// Called once after the last frame
    fn finish(&mut self, summary: &RunSummary) -> Result<()>;
}

/// Discards every frame
pub struct NullSink;

impl FrameSink for NullSink {
    fn name(&self) -> &str { "none" }

    fn draw(&mut self, _frame: &Frame<'_>) -> Result<ControlFlow<()>> {
        Ok(ControlFlow::Continue(()))
    }

    fn finish(&mut self, _summary: &RunSummary) -> Result<()> {
        Ok(())
    }
}

/// Create the configured sink
pub fn create_sink(config: &RenderConfig, stream_length: usize) -> Result<Box<dyn FrameSink>> {
    let sink: Box<dyn FrameSink> = match config.sink {
        SinkKind::Terminal => {
            let bounds = ChartBounds::new(stream_length, config);
            Box::new(terminal::TerminalSink::new(bounds, config.hold)?)
        }
        SinkKind::Log => Box::new(logging::LogSink::new()),
        SinkKind::Jsonl => Box::new(jsonl::JsonlSink::new(std::io::stdout())),
        SinkKind::None => Box::new(NullSink),
    };

    tracing::info!(sink = sink.name(), "Initialized frame sink");
    Ok(sink)
}
