//! Benchmark harness: dataset, model registry and the measurement loop.
//!
//! The loop is strictly sequential. For every model, in registration order, and
//! every image up to the requested count, one measurement runs to completion
//! (compress, write, read, compare, size, delete) before the next begins, so the
//! compression and decompression timings never overlap.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use crate::bench::report::{BenchmarkReport, ModelMetrics, ModelResult};
use crate::dataset::Dataset;
use crate::error::Result;
use crate::fidelity::{FidelityChecker, ImageViewer, LossyWarning};
use crate::image::RawImage;
use crate::model::{ModelRegistry, ModelSpec, PrimaryAction, Sample};
use crate::scratch::{self, ScratchSlot};
use crate::stats::PlotSink;

/// Configuration for a benchmark harness.
#[derive(Clone)]
pub struct BenchConfig {
    /// Directory holding the scratch slot.
    pub scratch_dir: PathBuf,

    /// File name of the scratch artifact.
    pub scratch_file: String,

    /// Scope of the one-time mismatch warning.
    pub lossy_warning: LossyWarning,

    /// Display collaborator for mismatch previews.
    pub viewer: Option<Arc<dyn ImageViewer>>,
}

impl BenchConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> BenchConfigBuilder {
        BenchConfigBuilder::default()
    }
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl fmt::Debug for BenchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BenchConfig")
            .field("scratch_dir", &self.scratch_dir)
            .field("scratch_file", &self.scratch_file)
            .field("lossy_warning", &self.lossy_warning)
            .field("viewer", &self.viewer.is_some())
            .finish()
    }
}

/// Builder for [`BenchConfig`].
#[derive(Default)]
pub struct BenchConfigBuilder {
    scratch_dir: Option<PathBuf>,
    scratch_file: Option<String>,
    lossy_warning: Option<LossyWarning>,
    viewer: Option<Arc<dyn ImageViewer>>,
}

impl BenchConfigBuilder {
    /// Set the scratch directory. Defaults to `codec-bench` under the system temp dir.
    #[must_use]
    pub fn scratch_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.scratch_dir = Some(path.into());
        self
    }

    /// Set the scratch artifact's file name.
    #[must_use]
    pub fn scratch_file(mut self, name: impl Into<String>) -> Self {
        self.scratch_file = Some(name.into());
        self
    }

    /// Set the mismatch warning scope.
    #[must_use]
    pub fn lossy_warning(mut self, policy: LossyWarning) -> Self {
        self.lossy_warning = Some(policy);
        self
    }

    /// Set the viewer used for mismatch previews.
    #[must_use]
    pub fn viewer(mut self, viewer: Arc<dyn ImageViewer>) -> Self {
        self.viewer = Some(viewer);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> BenchConfig {
        BenchConfig {
            scratch_dir: self
                .scratch_dir
                .unwrap_or_else(|| std::env::temp_dir().join("codec-bench")),
            scratch_file: self
                .scratch_file
                .unwrap_or_else(|| scratch::DEFAULT_FILE_NAME.to_string()),
            lossy_warning: self.lossy_warning.unwrap_or_default(),
            viewer: self.viewer,
        }
    }
}

/// Benchmark harness over a fixed dataset.
///
/// The one-time mismatch warning is a `tracing` event and is only visible once a
/// subscriber is installed. [`BenchmarkReport::diagnostics`] always records it.
///
/// # Example
///
/// ```rust,no_run
/// use codec_bench::{BenchConfig, Harness, ModelSpec, RawImage, VecDataset};
///
/// let image = RawImage::from_u8(2, 2, 1, vec![0, 1, 2, 3])?;
/// let mut harness = Harness::new(&VecDataset::new(vec![image]), BenchConfig::default())?;
///
/// harness.set_model(
///     "raw",
///     ModelSpec::<RawImage>::new()
///         .identity_preprocess()
///         .auto_save(|img: &RawImage, slot| slot.write(&img.to_le_bytes()))
///         .restore(|slot| RawImage::from_u8(2, 2, 1, slot.read()?)),
/// );
///
/// let report = harness.benchmark(1)?;
/// # Ok::<(), codec_bench::Error>(())
/// ```
pub struct Harness {
    config: BenchConfig,
    dataset: Vec<RawImage>,
    lens: Vec<usize>,
    registry: ModelRegistry,
    slot: ScratchSlot,
}

impl Harness {
    /// Read the dataset once, cache per-image element counts and create the scratch slot.
    pub fn new(dataset: &dyn Dataset, config: BenchConfig) -> Result<Self> {
        let dataset = dataset.images()?;
        let lens = dataset.iter().map(RawImage::len).collect();
        let slot = ScratchSlot::create(&config.scratch_dir, &config.scratch_file)?;
        tracing::debug!(images = dataset.len(), scratch = %slot.path().display(), "harness ready");

        Ok(Self {
            config,
            dataset,
            lens,
            registry: ModelRegistry::new(),
            slot,
        })
    }

    /// Register or overwrite a model. Returns `false` if the hooks are incomplete.
    pub fn set_model<T1, T2>(&mut self, name: &str, spec: ModelSpec<T1, T2>) -> bool
    where
        T1: PartialEq + 'static,
        T2: 'static,
    {
        self.registry.set_model(name, spec)
    }

    /// The hook performing `name`'s main compression action.
    #[must_use]
    pub fn get_model(&self, name: &str) -> Option<PrimaryAction> {
        self.registry.get_model(name)
    }

    /// Remove a model. Returns whether it was registered.
    pub fn del_model(&mut self, name: &str) -> bool {
        self.registry.del_model(name)
    }

    /// The model registry.
    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// The dataset, in benchmark order.
    #[must_use]
    pub fn dataset(&self) -> &[RawImage] {
        &self.dataset
    }

    /// Cached `H * W * C` per dataset image.
    #[must_use]
    pub fn lens(&self) -> &[usize] {
        &self.lens
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &BenchConfig {
        &self.config
    }

    /// Measure every registered model on the first `num_images` images.
    ///
    /// Any hook error aborts the run and is returned unchanged.
    pub fn run(&self, num_images: usize) -> Result<BenchmarkReport> {
        let started = Instant::now();
        let mut report = BenchmarkReport::new(num_images);
        let mut fidelity = FidelityChecker::new(self.config.lossy_warning, self.config.viewer.clone());

        tracing::info!(
            models = self.registry.len(),
            images = num_images.min(self.dataset.len()),
            "starting benchmark"
        );
        self.slot.clear()?;

        for (name, model) in self.registry.iter() {
            let mut metrics = ModelMetrics::default();
            let samples = self.dataset.iter().zip(&self.lens).take(num_images);

            for (index, (image, &elements)) in samples.enumerate() {
                let sample = Sample {
                    index,
                    image,
                    elements,
                };
                let (row, matched) = model.measure(name, sample, &self.slot, &mut fidelity)?;
                metrics.push(row);
                if !matched {
                    metrics.mismatches += 1;
                }
            }

            tracing::info!(
                model = name,
                images = metrics.len(),
                mismatches = metrics.mismatches,
                "model done"
            );
            report.models.push(ModelResult {
                name: name.to_string(),
                metrics,
            });
        }

        report.lossy = fidelity.is_lossy();
        report.diagnostics = fidelity.into_diagnostics();
        report.elapsed = started.elapsed();
        Ok(report)
    }

    /// [`run`](Self::run), then print the per-model means.
    ///
    /// Fails with [`Error::NoMeasurements`](crate::Error::NoMeasurements) if a model
    /// measured no images.
    pub fn benchmark(&self, num_images: usize) -> Result<BenchmarkReport> {
        let report = self.run(num_images)?;
        report.print_summary()?;
        Ok(report)
    }

    /// [`benchmark`](Self::benchmark), then hand the aggregated results to `sink`.
    pub fn benchmark_and_plot(
        &self,
        num_images: usize,
        sink: &mut dyn PlotSink,
    ) -> Result<BenchmarkReport> {
        let report = self.benchmark(num_images)?;
        sink.render(&report.plot_payload()?)?;
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::bench::report::PlotPayload;
    use crate::dataset::VecDataset;
    use crate::error::Error;
    use crate::image::Samples;

    fn dataset() -> VecDataset {
        VecDataset::new(
            (0..3u8)
                .map(|i| RawImage::from_u8(2, 2, 1, vec![i, i + 1, i + 2, i + 3]).unwrap())
                .collect(),
        )
    }

    fn harness(dir: &tempfile::TempDir) -> Harness {
        let config = BenchConfig::builder().scratch_dir(dir.path()).build();
        Harness::new(&dataset(), config).unwrap()
    }

    fn lossless() -> ModelSpec<RawImage> {
        ModelSpec::new()
            .identity_preprocess()
            .auto_save(|img: &RawImage, slot| slot.write(&img.to_le_bytes()))
            .restore(|slot| RawImage::from_u8(2, 2, 1, slot.read()?))
    }

    fn bit_flipping() -> ModelSpec<RawImage, Vec<u8>> {
        ModelSpec::new()
            .identity_preprocess()
            .encoder(|img: &RawImage| Ok(img.to_le_bytes()))
            .persist_encoded(|bytes: &Vec<u8>, slot| slot.write(bytes))
            .restore(|slot| {
                let mut bytes = slot.read()?;
                bytes[0] ^= 1;
                RawImage::from_u8(2, 2, 1, bytes)
            })
    }

    #[test]
    fn test_harness_caches_element_counts() {
        let dir = tempfile::tempdir().unwrap();
        let harness = harness(&dir);
        assert_eq!(harness.lens(), [4, 4, 4]);
        assert_eq!(harness.dataset().len(), 3);
    }

    #[test]
    fn test_lossless_and_lossy_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let mut harness = harness(&dir);
        assert!(harness.set_model("lossless", lossless()));
        assert!(harness.set_model("lossy", bit_flipping()));

        let report = harness.benchmark(3).unwrap();

        let exact = report.model("lossless").unwrap();
        assert_eq!(exact.bpsp, vec![8.0, 8.0, 8.0]);
        assert_eq!(exact.mismatches, 0);

        let lossy = report.model("lossy").unwrap();
        assert_eq!(lossy.len(), 3);
        assert_eq!(lossy.mismatches, 3);

        assert!(report.lossy);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].model, "lossy");
        assert_eq!(report.diagnostics[0].image_index, 0);

        for summary in report.summaries().unwrap() {
            let m = report.model(&summary.name).unwrap();
            let mean = |v: &[f64]| v.iter().sum::<f64>() / v.len() as f64;
            assert_eq!(summary.mean_bpsp, mean(&m.bpsp));
            assert_eq!(summary.mean_compression_mbps, mean(&m.compression_mbps));
            assert_eq!(summary.mean_decompression_mbps, mean(&m.decompression_mbps));
        }
        assert!(!dir.path().join("img").exists());
    }

    #[test]
    fn test_mismatch_recorded_without_subscriber() {
        let dir = tempfile::tempdir().unwrap();
        let mut harness = harness(&dir);
        harness.set_model("lossy", bit_flipping());

        let no_subscriber = tracing::subscriber::NoSubscriber::default();
        let report = tracing::subscriber::with_default(no_subscriber, || harness.run(3)).unwrap();
        assert!(report.lossy);
        assert_eq!(report.diagnostics.len(), 1);
        assert_eq!(report.diagnostics[0].model, "lossy");
    }

    #[test]
    fn test_lossless_run_never_flags() {
        let dir = tempfile::tempdir().unwrap();
        let mut harness = harness(&dir);
        harness.set_model("lossless", lossless());

        let report = harness.run(3).unwrap();
        assert!(!report.lossy);
        assert!(report.diagnostics.is_empty());
    }

    #[test]
    fn test_once_per_model_policy() {
        let dir = tempfile::tempdir().unwrap();
        let config = BenchConfig::builder()
            .scratch_dir(dir.path())
            .lossy_warning(LossyWarning::OncePerModel)
            .build();
        let mut harness = Harness::new(&dataset(), config).unwrap();
        harness.set_model("first", bit_flipping());
        harness.set_model("second", bit_flipping());

        let report = harness.run(3).unwrap();
        let warned: Vec<_> = report.diagnostics.iter().map(|d| d.model.as_str()).collect();
        assert_eq!(warned, ["first", "second"]);
    }

    #[test]
    fn test_image_count_is_capped_by_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let mut harness = harness(&dir);
        harness.set_model("lossless", lossless());

        assert_eq!(harness.run(10).unwrap().model("lossless").unwrap().len(), 3);
        assert_eq!(harness.run(2).unwrap().model("lossless").unwrap().len(), 2);
    }

    #[test]
    fn test_zero_images_fails_when_reporting() {
        let dir = tempfile::tempdir().unwrap();
        let mut harness = harness(&dir);
        harness.set_model("lossless", lossless());

        let err = harness.benchmark(0).unwrap_err();
        assert!(matches!(err, Error::NoMeasurements { .. }));
    }

    #[test]
    fn test_hook_failure_aborts_run() {
        let dir = tempfile::tempdir().unwrap();
        let mut harness = harness(&dir);
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        harness.set_model(
            "broken",
            lossless().restore(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(Error::codec("broken", "bad stream"))
            }),
        );
        harness.set_model("never-run", lossless());

        let err = harness.run(3).unwrap_err();
        assert!(matches!(err, Error::Codec { ref codec, .. } if codec == "broken"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // A later run starts from a clean slot.
        harness.del_model("broken");
        assert!(harness.run(3).is_ok());
    }

    #[test]
    fn test_custom_preprocess_and_compare() {
        let dir = tempfile::tempdir().unwrap();
        let mut harness = harness(&dir);
        // Only the first sample is compared, so the zero-filled tail is tolerated.
        let spec = ModelSpec::<Vec<u8>>::new()
            .preprocess(|img: &RawImage| match img.samples() {
                Samples::U8(v) => Ok(v.clone()),
                _ => Err(Error::codec("first", "expected 8-bit input")),
            })
            .auto_save(|v: &Vec<u8>, slot| slot.write(&v[..2]))
            .restore(|slot| {
                let mut bytes = slot.read()?;
                bytes.extend_from_slice(&[0, 0]);
                RawImage::from_u8(2, 2, 1, bytes)
            })
            .compare(|a: &Vec<u8>, b: &Vec<u8>| Ok(a[0] == b[0]));
        assert!(harness.set_model("first", spec));

        let report = harness.run(3).unwrap();
        let m = report.model("first").unwrap();
        assert_eq!(m.bpsp, vec![4.0, 4.0, 4.0]);
        assert_eq!(m.mismatches, 0);
    }

    #[derive(Default)]
    struct CapturingSink {
        payloads: Vec<PlotPayload>,
    }

    impl PlotSink for CapturingSink {
        fn render(&mut self, payload: &PlotPayload) -> Result<()> {
            self.payloads.push(payload.clone());
            Ok(())
        }
    }

    #[test]
    fn test_benchmark_and_plot_hands_payload_to_sink() {
        let dir = tempfile::tempdir().unwrap();
        let mut harness = harness(&dir);
        harness.set_model("lossless", lossless());
        harness.set_model("lossy", bit_flipping());

        let mut sink = CapturingSink::default();
        harness.benchmark_and_plot(3, &mut sink).unwrap();

        let payloads = &sink.payloads;
        assert_eq!(payloads.len(), 1);
        let names: Vec<_> = payloads[0].sorted_bpsp.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["lossless", "lossy"]);
        assert_ne!(
            payloads[0].compression_scatter[0].marker,
            payloads[0].compression_scatter[1].marker
        );
    }
}
