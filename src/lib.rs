pub mod analyzer;
pub mod config;
pub mod driver;
pub mod generator;
pub mod render;
pub mod stats;
pub mod window;

/// Common types used across modules
pub mod types {
    use serde::Serialize;

    /// A single stream measurement
    #[derive(Debug, Clone, Copy, PartialEq, Serialize)]
    pub struct Sample {
        pub index: usize,
        pub value: f64,
        /// Set when the generator replaced the value with an outlier
        pub injected: bool,
    }

    /// Anomaly severity levels
    #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
    pub enum Severity {
        Warn,
        Critical,
    }

    impl Severity {
        /// Warn past the threshold, Critical past twice the threshold.
        pub fn classify(z_score: f64, threshold: f64) -> Option<Self> {
            let magnitude = z_score.abs();
            if magnitude > threshold * 2.0 {
                Some(Severity::Critical)
            } else if magnitude > threshold {
                Some(Severity::Warn)
            } else {
                None
            }
        }
    }

    /// A window position whose z-score exceeded the threshold
    #[derive(Debug, Clone, Copy, PartialEq, Serialize)]
    pub struct Anomaly {
        /// Position within the window, 0 being the oldest value
        pub window_index: usize,
        pub value: f64,
        pub z_score: f64,
        pub severity: Severity,
    }

    impl std::fmt::Display for Severity {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Severity::Warn => write!(f, "WARN"),
                Severity::Critical => write!(f, "CRITICAL"),
            }
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_severity_classification() {
            assert_eq!(Severity::classify(1.9, 2.0), None);
            assert_eq!(Severity::classify(2.0, 2.0), None);
            assert_eq!(Severity::classify(-2.5, 2.0), Some(Severity::Warn));
            assert_eq!(Severity::classify(4.1, 2.0), Some(Severity::Critical));
            assert_eq!(Severity::Critical.to_string(), "CRITICAL");
        }
    }
}
