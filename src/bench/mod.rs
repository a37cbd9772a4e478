//! Benchmark execution and reporting.
//!
//! - [`harness::Harness`]: Dataset, model registry and the measurement loop
//! - [`harness::BenchConfig`]: Configuration for a harness
//! - [`report`]: Per-model metric sequences, means and plot payloads

pub mod harness;
pub mod report;

pub use harness::{BenchConfig, Harness};
pub use report::{BenchmarkReport, ModelMetrics, ModelSummary, PlotPayload};
