//! # codec-bench
//!
//! Benchmark harness for lossless (and lossy) image codecs.
//!
//! Codecs are plugged in as bundles of hooks (preprocess, encode, persist,
//! restore, compare). The harness drives every registered model through the
//! same protocol on a fixed dataset and reports, per image, the compression
//! rate in bits per sub-pixel (bpsp) and the compression and decompression
//! throughput in MB/s. Round trips that do not compare equal are flagged once
//! and still measured.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use codec_bench::{BenchConfig, Harness, ModelSpec, RawImage, VecDataset};
//!
//! let mut harness = Harness::new(&VecDataset::new(images), BenchConfig::default())?;
//!
//! harness.set_model(
//!     "my-codec",
//!     ModelSpec::<RawImage, Vec<u8>>::new()
//!         .identity_preprocess()
//!         .encoder(|img| my_codec::encode(img))
//!         .persist_encoded(|bytes, slot| slot.write(bytes))
//!         .restore(|slot| my_codec::decode(&slot.read()?)),
//! );
//!
//! let report = harness.benchmark(100)?;
//! ```
//!
//! ## Modules
//!
//! - [`error`]: Error types for the library
//! - [`image`]: Raw `H x W x C` image arrays
//! - [`dataset`]: Dataset capability
//! - [`scratch`]: Single-slot artifact storage
//! - [`metrics`]: bpsp and throughput conversions
//! - [`model`]: Model hooks and registry
//! - [`fidelity`]: Round-trip mismatch detection
//! - [`bench`]: Harness and reports
//! - [`stats`]: Statistics and SVG charts

pub mod bench;
pub mod dataset;
pub mod error;
pub mod fidelity;
pub mod image;
pub mod metrics;
pub mod model;
pub mod scratch;
pub mod stats;

// Re-export commonly used types
pub use bench::{BenchConfig, BenchmarkReport, Harness, ModelMetrics, ModelSummary, PlotPayload};
pub use dataset::{Dataset, VecDataset};
pub use error::{Error, Result};
pub use fidelity::{Diagnostic, ImageViewer, LossyWarning, PnmDumpViewer};
pub use image::{RawImage, SampleKind, Samples};
pub use metrics::MeasurementRow;
pub use model::{ModelRegistry, ModelSpec, PrimaryAction};
pub use scratch::ScratchSlot;
pub use stats::{PlotSink, Summary, SvgPlotter};
