//! Unit conversions from raw measurements to reported metrics.
//!
//! | Metric | Formula |
//! |--------|---------|
//! | bpsp | `artifact_bytes * 8 / elements` |
//! | throughput (MB/s) | `elements * pixel_bits / (8 * 10^6) / seconds` |
//!
//! `elements` is the `H * W * C` count of the source image and `pixel_bits` the
//! bit width of one element of the restored array. Throughput is not clamped:
//! a near-zero elapsed time yields a very large (or infinite) value.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::image::RawImage;

/// Bytes per megabyte used for throughput.
pub const BYTES_PER_MB: f64 = 1_000_000.0;

/// Bits per sub-pixel for an artifact of `artifact_bytes` covering `elements` sub-pixels.
#[must_use]
pub fn bits_per_subpixel(artifact_bytes: u64, elements: usize) -> f64 {
    (artifact_bytes * 8) as f64 / elements as f64
}

/// Uncompressed size of `elements` sub-pixels of `pixel_bits` each, in MB.
#[must_use]
pub fn uncompressed_megabytes(elements: usize, pixel_bits: u32) -> f64 {
    (elements as f64 * f64::from(pixel_bits)) / (8.0 * BYTES_PER_MB)
}

/// Throughput in MB/s of processing `elements` sub-pixels of `pixel_bits` each in `elapsed`.
#[must_use]
pub fn throughput_mbps(elements: usize, pixel_bits: u32, elapsed: Duration) -> f64 {
    uncompressed_megabytes(elements, pixel_bits) / elapsed.as_secs_f64()
}

/// Metrics for one (model, image) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MeasurementRow {
    /// Bits per sub-pixel.
    pub bpsp: f64,
    /// Compression throughput in MB/s.
    pub compression_mbps: f64,
    /// Decompression throughput in MB/s.
    pub decompression_mbps: f64,
}

impl MeasurementRow {
    /// Derive the row from raw measurements.
    #[must_use]
    pub fn from_raw(
        artifact_bytes: u64,
        elements: usize,
        pixel_bits: u32,
        encode_time: Duration,
        decode_time: Duration,
    ) -> Self {
        Self {
            bpsp: bits_per_subpixel(artifact_bytes, elements),
            compression_mbps: throughput_mbps(elements, pixel_bits, encode_time),
            decompression_mbps: throughput_mbps(elements, pixel_bits, decode_time),
        }
    }
}

/// PSNR in dB between two raw images of the same shape.
///
/// Returns `None` when shapes or element types differ, `INFINITY` for identical images.
#[must_use]
pub fn psnr(reference: &RawImage, test: &RawImage) -> Option<f64> {
    if reference.shape() != test.shape() || reference.sample_kind() != test.sample_kind() {
        return None;
    }

    let mut mse_sum: f64 = 0.0;
    for (r, t) in reference.iter_f64().zip(test.iter_f64()) {
        let diff = r - t;
        mse_sum += diff * diff;
    }
    let mse = mse_sum / reference.len() as f64;

    if mse == 0.0 {
        Some(f64::INFINITY)
    } else {
        let peak = reference.peak();
        Some(10.0 * (peak * peak / mse).log10())
    }
}
