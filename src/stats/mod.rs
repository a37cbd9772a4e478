//! Descriptive statistics over per-image metric sequences.
//!
//! - [`Summary`]: Descriptive statistics (mean, median, std_dev, percentiles)
//! - [`mean`], [`median`], [`std_dev`], [`percentile`]: Basic statistical functions
//! - [`sorted`]: Ascending copy used for index-vs-value curves
//!
//! [`mean`] returns `None` for an empty slice rather than a made-up zero; callers
//! decide whether that is an error.

pub mod chart;

pub use chart::{Marker, PlotSink, SvgPlotter};

use serde::{Deserialize, Serialize};

/// Descriptive statistics for a set of measurements.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    /// Number of values.
    pub count: usize,
    /// Mean value.
    pub mean: f64,
    /// Median value.
    pub median: f64,
    /// Standard deviation.
    pub std_dev: f64,
    /// Minimum value.
    pub min: f64,
    /// Maximum value.
    pub max: f64,
    /// 5th percentile.
    pub p5: f64,
    /// 95th percentile.
    pub p95: f64,
}

impl Summary {
    /// Compute summary statistics for a slice of values.
    ///
    /// Returns `None` if the slice is empty.
    #[must_use]
    pub fn compute(values: &[f64]) -> Option<Self> {
        let mean = mean(values)?;
        let sorted = sorted(values);
        let count = sorted.len();

        Some(Self {
            count,
            mean,
            median: percentile_sorted(&sorted, 0.5),
            std_dev: std_dev(values),
            min: sorted[0],
            max: sorted[count - 1],
            p5: percentile_sorted(&sorted, 0.05),
            p95: percentile_sorted(&sorted, 0.95),
        })
    }
}

/// Ascending copy of `values`. NaN sorts last.
#[must_use]
pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted
}

/// Compute arithmetic mean, or `None` for an empty slice.
///
/// # Example
///
/// ```
/// use codec_bench::stats::mean;
///
/// assert!((mean(&[1.0, 2.0, 3.0, 4.0, 5.0]).unwrap() - 3.0).abs() < 0.001);
/// assert_eq!(mean(&[]), None);
/// ```
#[must_use]
pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// Compute median of a slice.
///
/// For even-length slices, returns the average of the two middle values.
///
/// ```
/// use codec_bench::stats::median;
///
/// assert_eq!(median(&[1.0, 2.0, 3.0, 4.0]), Some(2.5));
/// ```
#[must_use]
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(percentile_sorted(&sorted(values), 0.5))
}

/// Compute sample standard deviation (N-1 denominator). Zero for fewer than two values.
#[must_use]
pub fn std_dev(values: &[f64]) -> f64 {
    let Some(m) = mean(values) else {
        return 0.0;
    };
    if values.len() < 2 {
        return 0.0;
    }
    let variance = values.iter().map(|x| (x - m).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

/// Compute percentile using linear interpolation (R-7 method), `p` in `0.0..=1.0`.
#[must_use]
pub fn percentile(values: &[f64], p: f64) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(percentile_sorted(&sorted(values), p))
}

fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    if sorted.len() == 1 {
        return sorted[0];
    }

    let idx = p.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lower = idx.floor() as usize;
    let upper = idx.ceil() as usize;
    let frac = idx - lower as f64;

    if lower == upper {
        sorted[lower]
    } else {
        sorted[lower] * (1.0 - frac) + sorted[upper] * frac
    }
}
