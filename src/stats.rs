use serde::Serialize;

/// Per-value rounding allowance, in ulps, when deciding that a spread is zero.
const ZERO_SPREAD_ULPS: f64 = 4.0;

/// Mean and population standard deviation of a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WindowStats {
    pub mean: f64,
    pub std_dev: f64,
    pub count: usize,
}

impl WindowStats {
    /// Compute stats over the given values, dividing by N (not N-1).
    pub fn from_values<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = f64>,
        I::IntoIter: Clone,
    {
        let iter = values.into_iter();
        let (count, sum) = iter.clone().fold((0usize, 0.0), |(n, s), v| (n + 1, s + v));
        if count == 0 {
            return None;
        }
        let n = count as f64;
        let mean = sum / n;
        let variance = iter.map(|v| (v - mean).powi(2)).sum::<f64>() / n;

        Some(Self {
            mean,
            std_dev: variance.sqrt(),
            count,
        })
    }

    /// True when the window has no variation to score against.
    ///
    /// A window of identical values can still show a spread of a few ulps of
    /// the mean after summation, so the cut-off scales with `|mean|` and the
    /// count. It is relative only: data at any magnitude keeps its flags.
    pub fn is_degenerate(&self) -> bool {
        let rounding = ZERO_SPREAD_ULPS * self.count as f64 * f64::EPSILON * self.mean.abs();
        self.std_dev == 0.0 || self.std_dev <= rounding
    }

    /// z = (value - mean) / std_dev, or `None` if the window is degenerate.
    pub fn z_score(&self, value: f64) -> Option<f64> {
        if self.is_degenerate() {
            return None;
        }
        Some((value - self.mean) / self.std_dev)
    }
}
