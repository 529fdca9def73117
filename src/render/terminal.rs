//! Animated terminal chart with a one-line status bar.

use std::io::{self, Stdout};
use std::ops::ControlFlow;
use std::time::Duration;

use anyhow::{Context, Result};
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
    Terminal,
};

use crate::driver::RunSummary;
use super::{ChartBounds, Frame, FrameSink};

const TITLE: &str = "Real-Time Data Stream Anomaly Detection";

/// Draws each frame as a line chart in the alternate screen.
pub struct TerminalSink {
    terminal: Terminal<CrosstermBackend<Stdout>>,
    bounds: ChartBounds,
    hold: bool,
    flagged_total: usize,
    restored: bool,
}

impl TerminalSink {
    pub fn new(bounds: ChartBounds, hold: bool) -> Result<Self> {
        enable_raw_mode().context("Failed to enable raw mode")?;
        let mut stdout = io::stdout();
        if let Err(e) = execute!(stdout, EnterAlternateScreen) {
            let _ = disable_raw_mode();
            return Err(e).context("Failed to enter alternate screen");
        }

        let terminal = match init_terminal(stdout) {
            Ok(terminal) => terminal,
            Err(e) => {
                let _ = execute!(io::stdout(), LeaveAlternateScreen);
                let _ = disable_raw_mode();
                return Err(e);
            }
        };

        Ok(Self {
            terminal,
            bounds,
            hold,
            flagged_total: 0,
            restored: false,
        })
    }

    fn restore(&mut self) -> Result<()> {
        if self.restored {
            return Ok(());
        }
        self.restored = true;
        disable_raw_mode()?;
        execute!(self.terminal.backend_mut(), LeaveAlternateScreen)?;
        self.terminal.show_cursor()?;
        Ok(())
    }

    /// True if the user asked to quit. Does not block.
    fn quit_requested() -> Result<bool> {
        while event::poll(Duration::ZERO)? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press
                    && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

impl FrameSink for TerminalSink {
    fn name(&self) -> &str { "terminal" }

    fn draw(&mut self, frame: &Frame<'_>) -> Result<ControlFlow<()>> {
        self.flagged_total += frame.flagged.len();
        let bounds = self.bounds;
        let flagged_total = self.flagged_total;
        self.terminal
            .draw(|f| {
                let area = f.area();
                render(f, area, frame, &bounds, flagged_total)
            })
            .context("Failed to draw frame")?;

        if Self::quit_requested()? {
            return Ok(ControlFlow::Break(()));
        }
        Ok(ControlFlow::Continue(()))
    }

    fn finish(&mut self, summary: &RunSummary) -> Result<()> {
        if self.hold {
            let footer = format!(
                " done | {} samples | flagged {} | injected {} | press any key ",
                summary.samples, summary.flagged, summary.injected
            );
            self.terminal.draw(|f| {
                let area = f.area();
                let bottom = Rect { y: area.bottom().saturating_sub(1), height: area.height.min(1), ..area };
                f.render_widget(
                    Paragraph::new(footer.as_str()).style(Style::default().add_modifier(Modifier::REVERSED)),
                    bottom,
                );
            })?;

            loop {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        break;
                    }
                }
            }
        }
        self.restore()
    }
}

impl Drop for TerminalSink {
    fn drop(&mut self) {
        if let Err(e) = self.restore() {
            tracing::warn!(error = %e, "Failed to restore terminal");
        }
    }
}

fn init_terminal<W: io::Write>(out: W) -> Result<Terminal<CrosstermBackend<W>>> {
    let mut terminal = Terminal::new(CrosstermBackend::new(out))
        .context("Failed to initialize terminal")?;
    terminal.clear().context("Failed to clear terminal")?;
    Ok(terminal)
}

/// Render one frame into `area`: the chart on top, a status line below.
pub fn render(
    f: &mut ratatui::Frame,
    area: Rect,
    frame: &Frame<'_>,
    bounds: &ChartBounds,
    flagged_total: usize,
) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(1)])
        .split(area);

    let stream: Vec<(f64, f64)> = frame
        .samples
        .iter()
        .map(|s| (s.index as f64, s.value))
        .collect();
    let markers: Vec<(f64, f64)> = frame
        .flagged
        .iter()
        .map(|p| (p.stream_index as f64, p.anomaly.value))
        .collect();

    let mut datasets = vec![Dataset::default()
        .name("Data Stream")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(Style::default().fg(Color::Blue))
        .data(&stream)];
    if !markers.is_empty() {
        datasets.push(
            Dataset::default()
                .name("Anomaly")
                .marker(symbols::Marker::Block)
                .graph_type(GraphType::Scatter)
                .style(Style::default().fg(Color::Red))
                .data(&markers),
        );
    }

    let chart = Chart::new(datasets)
        .block(Block::default().title(TITLE).borders(Borders::ALL))
        .x_axis(
            Axis::default()
                .title("Data Point Index")
                .bounds(bounds.x)
                .labels(axis_labels(bounds.x)),
        )
        .y_axis(
            Axis::default()
                .title("Value")
                .bounds(bounds.y)
                .labels(axis_labels(bounds.y)),
        );
    f.render_widget(chart, chunks[0]);

    let mut spans = vec![Span::raw(format!(" step {}", frame.step))];
    if let Some(stats) = frame.stats {
        spans.push(Span::raw(format!(" | mean {:.1} | std {:.1}", stats.mean, stats.std_dev)));
    } else {
        spans.push(Span::raw(" | warming up"));
    }
    spans.push(Span::styled(
        format!(" | flagged {}", flagged_total),
        Style::default().fg(Color::Red),
    ));
    spans.push(Span::raw(" | q to quit"));
    f.render_widget(Paragraph::new(Line::from(spans)), chunks[1]);
}

fn axis_labels(range: [f64; 2]) -> Vec<String> {
    let [lo, hi] = range;
    let mid = (lo + hi) / 2.0;
    vec![format!("{:.0}", lo), format!("{:.0}", mid), format!("{:.0}", hi)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RenderConfig;
    use crate::render::FlaggedPoint;
    use crate::types::{Anomaly, Sample, Severity};
    use ratatui::backend::TestBackend;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    struct BrokenPipe;

    impl io::Write for BrokenPipe {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
    }

    #[test]
    fn test_init_terminal_reports_write_failure() {
        // Must surface as an error so `new` can leave the alternate screen
        assert!(init_terminal(BrokenPipe).is_err());
    }

    #[test]
    fn test_axis_labels() {
        assert_eq!(axis_labels([-20.0, 60.0]), vec!["-20", "20", "60"]);
    }

    #[test]
    fn test_render_chart_and_status() {
        let samples: Vec<Sample> = (0..60)
            .map(|i| Sample { index: i, value: (i as f64 * 0.1).sin() * 10.0, injected: false })
            .collect();
        let flagged = [FlaggedPoint {
            stream_index: 59,
            anomaly: Anomaly {
                window_index: 49,
                value: 45.0,
                z_score: 6.0,
                severity: Severity::Critical,
            },
        }];
        let frame = Frame {
            step: 59,
            samples: &samples,
            flagged: &flagged,
            stats: Some(crate::stats::WindowStats { mean: 1.0, std_dev: 7.0, count: 50 }),
        };
        let bounds = ChartBounds::new(200, &RenderConfig::default());

        let mut terminal = Terminal::new(TestBackend::new(100, 30)).unwrap();
        terminal
            .draw(|f| {
                let area = f.area();
                render(f, area, &frame, &bounds, 3)
            })
            .unwrap();

        let text = buffer_text(&terminal);
        assert!(text.contains(TITLE));
        assert!(text.contains("step 59"));
        assert!(text.contains("mean 1.0"));
        assert!(text.contains("flagged 3"));
    }

    #[test]
    fn test_render_warming_up() {
        let samples = [Sample { index: 0, value: 0.0, injected: false }];
        let frame = Frame { step: 0, samples: &samples, flagged: &[], stats: None };
        let bounds = ChartBounds::new(200, &RenderConfig::default());

        let mut terminal = Terminal::new(TestBackend::new(80, 20)).unwrap();
        terminal
            .draw(|f| {
                let area = f.area();
                render(f, area, &frame, &bounds, 0)
            })
            .unwrap();
        assert!(buffer_text(&terminal).contains("warming up"));
    }
}
