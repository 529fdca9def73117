use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::{error, info};

use zscore_watch::analyzer;
use zscore_watch::config::{self, SinkKind};
use zscore_watch::driver::Driver;
use zscore_watch::generator::StreamGenerator;
use zscore_watch::render;

#[derive(Parser, Debug)]
#[command(name = "zscore-watch", about = "Sliding-window Z-score anomaly detection on a simulated stream")]
struct Cli {
    /// Path to configuration file (built-in defaults when omitted)
    #[arg(short, long, env = "ZSCORE_WATCH_CONFIG")]
    config: Option<String>,

    /// Seed for a reproducible stream
    #[arg(long)]
    seed: Option<u64>,

    /// Number of samples to generate
    #[arg(long)]
    length: Option<usize>,

    /// Sliding window size
    #[arg(short, long)]
    window: Option<usize>,

    /// Z-score threshold
    #[arg(short, long)]
    threshold: Option<f64>,

    /// Output sink: terminal, log, jsonl or none
    #[arg(long)]
    sink: Option<SinkKind>,

    /// Pause between frames in milliseconds
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Validate config and exit
    #[arg(long)]
    check: bool,

    /// Print version and exit
    #[arg(short, long)]
    version: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("zscore-watch {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let config = load_config(&cli)?;

    if cli.check {
        println!("Configuration is valid.");
        return Ok(());
    }

    // Initialize logging
    init_logging(&config)?;

    info!(
        version = env!("CARGO_PKG_VERSION"),
        window_size = config.detector.window_size,
        threshold = config.detector.threshold,
        length = config.stream.length,
        seed = ?config.stream.seed,
        "Starting zscore-watch"
    );

    if let Err(e) = run(config) {
        error!(error = %e, "Run terminated with error");
        return Err(e);
    }

    Ok(())
}

fn load_config(cli: &Cli) -> Result<config::Config> {
    let mut config = match &cli.config {
        Some(path) => config::Config::load(path)?,
        None => config::Config::default(),
    };

    // Command-line flags override file values
    if let Some(seed) = cli.seed {
        config.stream.seed = Some(seed);
    }
    if let Some(length) = cli.length {
        config.stream.length = length;
    }
    if let Some(window) = cli.window {
        config.detector.window_size = window;
    }
    if let Some(threshold) = cli.threshold {
        config.detector.threshold = threshold;
    }
    if let Some(sink) = cli.sink {
        config.render.sink = sink;
    }
    if let Some(delay) = cli.delay_ms {
        config.render.frame_delay_ms = delay;
    }

    config.validate()?;
    Ok(config)
}

fn init_logging(config: &config::Config) -> Result<()> {
    // The chart owns stdout, so only warnings reach stderr by default
    let level = match config.render.sink {
        SinkKind::Terminal => "warn",
        _ => config.log_level.as_str(),
    };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .init();

    Ok(())
}

fn run(config: config::Config) -> Result<()> {
    let samples = StreamGenerator::new(&config.stream)?.generate(config.stream.length);

    let detector = analyzer::create_detector(&config.detector)?;
    let sink = render::create_sink(&config.render, config.stream.length)?;

    let mut driver = Driver::new(
        detector,
        sink,
        Duration::from_millis(config.render.frame_delay_ms),
    );
    driver.run(&samples)?;

    Ok(())
}
