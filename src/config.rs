use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::Path;

/// Top-level configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub detector: DetectorConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub render: RenderConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            detector: DetectorConfig::default(),
            stream: StreamConfig::default(),
            render: RenderConfig::default(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum DetectorMode {
    /// Recompute mean and std-dev over the whole window every step
    #[default]
    Recompute,
    /// Maintain running statistics with a sliding Welford update
    Running,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectorConfig {
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub mode: DetectorMode,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            window_size: 50,
            threshold: 2.0,
            mode: DetectorMode::Recompute,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct StreamConfig {
    #[serde(default = "default_length")]
    pub length: usize,
    /// Fixed seed for reproducible streams; entropy-seeded when absent
    pub seed: Option<u64>,
    #[serde(default = "default_amplitude")]
    pub amplitude: f64,
    #[serde(default = "default_frequency")]
    pub frequency: f64,
    #[serde(default = "default_noise_min")]
    pub noise_min: f64,
    #[serde(default = "default_noise_max")]
    pub noise_max: f64,
    #[serde(default = "default_anomaly_min")]
    pub anomaly_min: f64,
    #[serde(default = "default_anomaly_max")]
    pub anomaly_max: f64,
    #[serde(default = "default_anomaly_probability")]
    pub anomaly_probability: f64,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            length: 200,
            seed: None,
            amplitude: 10.0,
            frequency: 0.1,
            noise_min: -5.0,
            noise_max: 5.0,
            anomaly_min: 30.0,
            anomaly_max: 50.0,
            anomaly_probability: 0.1,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SinkKind {
    #[default]
    Terminal,
    Log,
    Jsonl,
    None,
}

impl std::str::FromStr for SinkKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "terminal" => Ok(SinkKind::Terminal),
            "log" => Ok(SinkKind::Log),
            "jsonl" => Ok(SinkKind::Jsonl),
            "none" => Ok(SinkKind::None),
            other => bail!("Unknown sink '{}' (expected terminal, log, jsonl or none)", other),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RenderConfig {
    #[serde(default)]
    pub sink: SinkKind,
    #[serde(default = "default_frame_delay")]
    pub frame_delay_ms: u64,
    #[serde(default = "default_y_min")]
    pub y_min: f64,
    #[serde(default = "default_y_max")]
    pub y_max: f64,
    /// Keep the final chart on screen until a key is pressed
    #[serde(default = "default_true")]
    pub hold: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            sink: SinkKind::Terminal,
            frame_delay_ms: 100,
            y_min: -20.0,
            y_max: 60.0,
            hold: true,
        }
    }
}

impl Config {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        // Expand environment variables
        let expanded = expand_env_vars(content);

        let config: Config = toml::from_str(&expanded)
            .with_context(|| "Failed to parse configuration")?;
        config.validate()?;

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let d = &self.detector;
        if d.window_size == 0 {
            bail!("detector.window_size must be at least 1");
        }
        if !d.threshold.is_finite() || d.threshold <= 0.0 {
            bail!("detector.threshold must be a positive number, got {}", d.threshold);
        }

        let s = &self.stream;
        check_range("stream.noise", s.noise_min, s.noise_max)?;
        check_range("stream.anomaly", s.anomaly_min, s.anomaly_max)?;
        if !(0.0..=1.0).contains(&s.anomaly_probability) {
            bail!(
                "stream.anomaly_probability must be within [0, 1], got {}",
                s.anomaly_probability
            );
        }
        if !s.amplitude.is_finite() || !s.frequency.is_finite() {
            bail!("stream.amplitude and stream.frequency must be finite");
        }

        let r = &self.render;
        if !(r.y_min.is_finite() && r.y_max.is_finite() && r.y_min < r.y_max) {
            bail!("render.y_min ({}) must be below render.y_max ({})", r.y_min, r.y_max);
        }

        Ok(())
    }
}

fn check_range(name: &str, min: f64, max: f64) -> Result<()> {
    if !(min.is_finite() && max.is_finite() && (max - min).is_finite() && min < max) {
        bail!("{} range is empty or inverted: [{}, {}]", name, min, max);
    }
    Ok(())
}

/// Expand ${ENV_VAR} references in config string
fn expand_env_vars(input: &str) -> String {
    static ENV_REF: std::sync::OnceLock<regex::Regex> = std::sync::OnceLock::new();
    let re = ENV_REF.get_or_init(|| {
        regex::Regex::new(r"\$\{([^}]+)\}").expect("env reference pattern is valid")
    });
    re.replace_all(input, |caps: &regex::Captures| {
        let var_name = &caps[1];
        std::env::var(var_name).unwrap_or_default()
    })
    .to_string()
}

// Default value functions
fn default_log_level() -> String { "info".to_string() }
fn default_window_size() -> usize { 50 }
fn default_threshold() -> f64 { 2.0 }
fn default_length() -> usize { 200 }
fn default_amplitude() -> f64 { 10.0 }
fn default_frequency() -> f64 { 0.1 }
fn default_noise_min() -> f64 { -5.0 }
fn default_noise_max() -> f64 { 5.0 }
fn default_anomaly_min() -> f64 { 30.0 }
fn default_anomaly_max() -> f64 { 50.0 }
fn default_anomaly_probability() -> f64 { 0.1 }
fn default_frame_delay() -> u64 { 100 }
fn default_y_min() -> f64 { -20.0 }
fn default_y_max() -> f64 { 60.0 }
fn default_true() -> bool { true }

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = Config::parse("").unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.detector.window_size, 50);
        assert_eq!(config.detector.threshold, 2.0);
        assert_eq!(config.detector.mode, DetectorMode::Recompute);
        assert_eq!(config.stream.length, 200);
        assert_eq!(config.stream.seed, None);
        assert_eq!(config.stream.anomaly_probability, 0.1);
        assert_eq!(config.render.sink, SinkKind::Terminal);
        assert_eq!(config.render.y_min, -20.0);
        assert_eq!(config.render.y_max, 60.0);
    }

    #[test]
    fn test_example_config_parses() {
        let config = Config::parse(include_str!("../config.example.toml")).unwrap();
        assert_eq!(config.detector.window_size, 50);
        assert_eq!(config.render.frame_delay_ms, 100);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
log_level = "debug"

[detector]
window_size = 20
threshold = 3.0
mode = "running"

[stream]
length = 500
seed = 7

[render]
sink = "jsonl"
frame_delay_ms = 0
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.detector.window_size, 20);
        assert_eq!(config.detector.mode, DetectorMode::Running);
        assert_eq!(config.stream.length, 500);
        assert_eq!(config.stream.seed, Some(7));
        assert_eq!(config.stream.amplitude, 10.0);
        assert_eq!(config.render.sink, SinkKind::Jsonl);
        assert_eq!(config.render.frame_delay_ms, 0);
    }

    #[test]
    fn test_missing_file_reports_path() {
        let err = Config::load("/nonexistent/zscore-watch.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/zscore-watch.toml"));
    }

    #[test]
    fn test_env_expansion() {
        std::env::set_var("ZSCORE_WATCH_TEST_LEVEL", "trace");
        let config = Config::parse("log_level = \"${ZSCORE_WATCH_TEST_LEVEL}\"").unwrap();
        assert_eq!(config.log_level, "trace");
    }

    #[test]
    fn test_rejects_zero_window() {
        let err = Config::parse("[detector]\nwindow_size = 0").unwrap_err();
        assert!(err.to_string().contains("window_size"));
    }

    #[test]
    fn test_rejects_bad_ranges() {
        assert!(Config::parse("[stream]\nnoise_min = 5.0\nnoise_max = -5.0").is_err());
        assert!(Config::parse("[stream]\nanomaly_probability = 1.5").is_err());
        assert!(Config::parse("[stream]\nnoise_min = -1.7e308\nnoise_max = 1.7e308").is_err());
        assert!(Config::parse("[detector]\nthreshold = -1.0").is_err());
        assert!(Config::parse("[render]\ny_min = 10.0\ny_max = 0.0").is_err());
    }

    #[test]
    fn test_sink_from_str() {
        assert_eq!("LOG".parse::<SinkKind>().unwrap(), SinkKind::Log);
        assert!("plot".parse::<SinkKind>().is_err());
    }
}
