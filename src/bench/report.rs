//! Benchmark results and their aggregation.
//!
//! A [`BenchmarkReport`] holds, per model, the three aligned metric sequences
//! collected by one run. Reduction to means, console summary lines and the
//! sorted/scatter payload for a [`PlotSink`](crate::stats::PlotSink) all live here.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fidelity::Diagnostic;
use crate::metrics::MeasurementRow;
use crate::stats::{self, Marker, Summary};

/// Per-image metric sequences for one model, aligned by image index.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Bits per sub-pixel.
    pub bpsp: Vec<f64>,
    /// Compression throughput in MB/s.
    pub compression_mbps: Vec<f64>,
    /// Decompression throughput in MB/s.
    pub decompression_mbps: Vec<f64>,
    /// Images whose round trip did not compare equal.
    pub mismatches: usize,
}

impl ModelMetrics {
    /// Append one image's metrics.
    pub fn push(&mut self, row: MeasurementRow) {
        self.bpsp.push(row.bpsp);
        self.compression_mbps.push(row.compression_mbps);
        self.decompression_mbps.push(row.decompression_mbps);
    }

    /// Number of measured images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.bpsp.len()
    }

    /// Whether no image was measured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bpsp.is_empty()
    }

    /// Whether any round trip mismatched.
    #[must_use]
    pub fn is_lossy(&self) -> bool {
        self.mismatches > 0
    }
}

/// Results of one model within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelResult {
    /// Model name.
    pub name: String,
    /// Collected metrics.
    pub metrics: ModelMetrics,
}

/// Means for one model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSummary {
    /// Model name.
    pub name: String,
    /// Scatter marker, from registration order.
    pub marker: Marker,
    /// Mean bits per sub-pixel.
    pub mean_bpsp: f64,
    /// Mean compression throughput in MB/s.
    pub mean_compression_mbps: f64,
    /// Mean decompression throughput in MB/s.
    pub mean_decompression_mbps: f64,
    /// Spread of the bpsp sequence.
    pub bpsp: Summary,
}

impl ModelSummary {
    /// The three console lines for this model.
    #[must_use]
    pub fn lines(&self) -> [String; 3] {
        [
            format!("{} model have a compression rate of {}bpsp", self.name, self.mean_bpsp),
            format!(
                "{} model have a compression throughput of {}MB/s",
                self.name, self.mean_compression_mbps
            ),
            format!(
                "{} model have a decompression throughput of {}MB/s",
                self.name, self.mean_decompression_mbps
            ),
        ]
    }
}

/// A sorted per-model metric sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    /// Model name.
    pub name: String,
    /// Scatter marker of the model.
    pub marker: Marker,
    /// Values in ascending order.
    pub values: Vec<f64>,
}

/// A (mean bpsp, mean throughput) pair for one model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterPoint {
    /// Model name.
    pub name: String,
    /// Scatter marker of the model.
    pub marker: Marker,
    /// Mean bits per sub-pixel.
    pub mean_bpsp: f64,
    /// Mean throughput in MB/s.
    pub mean_mbps: f64,
}

/// Everything a plotting sink needs from one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlotPayload {
    /// Per-model bpsp, ascending.
    pub sorted_bpsp: Vec<Series>,
    /// Per-model compression throughput, ascending.
    pub sorted_compression: Vec<Series>,
    /// Per-model decompression throughput, ascending.
    pub sorted_decompression: Vec<Series>,
    /// Mean bpsp vs. mean compression throughput.
    pub compression_scatter: Vec<ScatterPoint>,
    /// Mean bpsp vs. mean decompression throughput.
    pub decompression_scatter: Vec<ScatterPoint>,
}

/// Results of one benchmark run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BenchmarkReport {
    /// When the run started.
    pub timestamp: DateTime<Utc>,
    /// Images requested per model.
    pub requested_images: usize,
    /// Per-model results, in registration order.
    pub models: Vec<ModelResult>,
    /// Whether any round trip mismatched during the run.
    pub lossy: bool,
    /// Mismatch warnings emitted during the run.
    pub diagnostics: Vec<Diagnostic>,
    /// Wall-clock duration of the whole run.
    #[serde(with = "duration_millis")]
    pub elapsed: Duration,
}

impl BenchmarkReport {
    /// Create an empty report stamped now.
    #[must_use]
    pub fn new(requested_images: usize) -> Self {
        Self {
            timestamp: Utc::now(),
            requested_images,
            models: Vec::new(),
            lossy: false,
            diagnostics: Vec::new(),
            elapsed: Duration::ZERO,
        }
    }

    /// Metrics of `name`, if it was benchmarked.
    #[must_use]
    pub fn model(&self, name: &str) -> Option<&ModelMetrics> {
        self.models.iter().find(|m| m.name == name).map(|m| &m.metrics)
    }

    /// Means per model, in registration order.
    ///
    /// Fails with [`Error::NoMeasurements`] for the first model with no images.
    pub fn summaries(&self) -> Result<Vec<ModelSummary>> {
        self.models
            .iter()
            .enumerate()
            .map(|(index, model)| {
                let m = &model.metrics;
                let no_measurements = || Error::NoMeasurements {
                    model: model.name.clone(),
                };
                Ok(ModelSummary {
                    name: model.name.clone(),
                    marker: Marker::for_index(index),
                    mean_bpsp: stats::mean(&m.bpsp).ok_or_else(no_measurements)?,
                    mean_compression_mbps: stats::mean(&m.compression_mbps)
                        .ok_or_else(no_measurements)?,
                    mean_decompression_mbps: stats::mean(&m.decompression_mbps)
                        .ok_or_else(no_measurements)?,
                    bpsp: Summary::compute(&m.bpsp).ok_or_else(no_measurements)?,
                })
            })
            .collect()
    }

    /// Console summary lines, three per model.
    pub fn summary_lines(&self) -> Result<Vec<String>> {
        Ok(self
            .summaries()?
            .iter()
            .flat_map(ModelSummary::lines)
            .collect())
    }

    /// Print the summary lines to stdout.
    pub fn print_summary(&self) -> Result<()> {
        for line in self.summary_lines()? {
            println!("{line}");
        }
        Ok(())
    }

    /// Sorted sequences and mean scatter points for plotting.
    pub fn plot_payload(&self) -> Result<PlotPayload> {
        let summaries = self.summaries()?;
        let mut payload = PlotPayload::default();

        for (model, summary) in self.models.iter().zip(&summaries) {
            let series = |values: &[f64]| Series {
                name: model.name.clone(),
                marker: summary.marker,
                values: stats::sorted(values),
            };
            let point = |mean_mbps: f64| ScatterPoint {
                name: model.name.clone(),
                marker: summary.marker,
                mean_bpsp: summary.mean_bpsp,
                mean_mbps,
            };

            payload.sorted_bpsp.push(series(&model.metrics.bpsp));
            payload.sorted_compression.push(series(&model.metrics.compression_mbps));
            payload.sorted_decompression.push(series(&model.metrics.decompression_mbps));
            payload.compression_scatter.push(point(summary.mean_compression_mbps));
            payload.decompression_scatter.push(point(summary.mean_decompression_mbps));
        }

        Ok(payload)
    }

    /// Pretty JSON rendering of the report.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// Custom serialization for Duration as milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> BenchmarkReport {
        let mut report = BenchmarkReport::new(2);
        let mut a = ModelMetrics::default();
        a.push(MeasurementRow {
            bpsp: 4.0,
            compression_mbps: 10.0,
            decompression_mbps: 30.0,
        });
        a.push(MeasurementRow {
            bpsp: 2.0,
            compression_mbps: 20.0,
            decompression_mbps: 10.0,
        });
        report.models.push(ModelResult {
            name: "a".to_string(),
            metrics: a,
        });
        report
    }

    #[test]
    fn test_summary_lines_format() {
        let lines = report().summary_lines().unwrap();
        assert_eq!(
            lines,
            [
                "a model have a compression rate of 3bpsp",
                "a model have a compression throughput of 15MB/s",
                "a model have a decompression throughput of 20MB/s",
            ]
        );
    }

    #[test]
    fn test_empty_model_is_an_error() {
        let mut report = report();
        report.models.push(ModelResult {
            name: "empty".to_string(),
            metrics: ModelMetrics::default(),
        });

        let err = report.summaries().unwrap_err();
        assert!(matches!(err, Error::NoMeasurements { ref model } if model == "empty"));
        assert!(report.plot_payload().is_err());
    }

    #[test]
    fn test_plot_payload_sorts_and_averages() {
        let payload = report().plot_payload().unwrap();

        assert_eq!(payload.sorted_bpsp[0].values, vec![2.0, 4.0]);
        assert_eq!(payload.sorted_decompression[0].values, vec![10.0, 30.0]);
        assert_eq!(payload.compression_scatter[0].mean_bpsp, 3.0);
        assert_eq!(payload.compression_scatter[0].mean_mbps, 15.0);
        assert_eq!(payload.decompression_scatter[0].mean_mbps, 20.0);
        assert_eq!(payload.sorted_bpsp[0].marker, Marker::Circle);
    }

    #[test]
    fn test_report_json_round_trip() {
        let mut report = report();
        report.elapsed = Duration::from_millis(1500);

        let json = report.to_json().unwrap();
        let back: BenchmarkReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.elapsed, Duration::from_millis(1500));
        assert_eq!(back.model("a"), report.model("a"));
    }
}
