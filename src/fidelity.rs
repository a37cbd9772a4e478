//! Round-trip fidelity checking.
//!
//! After each restore the harness compares the preprocessed source image with the
//! preprocessed restored image using the model's comparison hook. A mismatch is
//! not an error: lossy codecs are benchmarked like any other. The first mismatch
//! emits a warning and a best-effort side-by-side preview; later mismatches are
//! measured silently ("lossy-tolerant mode").

use std::collections::HashSet;
use std::fs;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::image::RawImage;
use crate::metrics::psnr;

/// Display collaborator for mismatch previews.
///
/// Failures and panics from `show` are swallowed by the checker. A panic still
/// reaches the process panic hook, which prints it to stderr unless replaced.
pub trait ImageViewer: Send + Sync {
    /// Present `image` under `label`.
    fn show(&self, label: &str, image: &RawImage) -> Result<()>;
}

/// Scope of the one-time mismatch warning.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LossyWarning {
    /// One warning for the whole run, whichever model mismatches first.
    #[default]
    OncePerRun,
    /// One warning per model per run.
    OncePerModel,
}

/// A mismatch that produced a warning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Model that failed the round trip.
    pub model: String,
    /// Dataset index of the image.
    pub image_index: usize,
    /// PSNR of the raw restored image against the raw source, if comparable.
    pub psnr: Option<f64>,
}

/// Per-run fidelity state.
pub struct FidelityChecker {
    policy: LossyWarning,
    viewer: Option<Arc<dyn ImageViewer>>,
    lossy: bool,
    flagged: HashSet<String>,
    diagnostics: Vec<Diagnostic>,
}

impl FidelityChecker {
    /// Fresh state for one benchmark run.
    #[must_use]
    pub fn new(policy: LossyWarning, viewer: Option<Arc<dyn ImageViewer>>) -> Self {
        Self {
            policy,
            viewer,
            lossy: false,
            flagged: HashSet::new(),
            diagnostics: Vec::new(),
        }
    }

    /// The run-wide lossy flag. Monotonic within a run.
    #[must_use]
    pub fn is_lossy(&self) -> bool {
        self.lossy
    }

    /// Whether `model` has mismatched at least once in this run.
    #[must_use]
    pub fn is_model_lossy(&self, model: &str) -> bool {
        self.flagged.contains(model)
    }

    /// Warnings emitted so far.
    #[must_use]
    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    /// Consume the checker, returning the emitted warnings.
    #[must_use]
    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }

    fn suppressed(&self, model: &str) -> bool {
        match self.policy {
            LossyWarning::OncePerRun => self.lossy,
            LossyWarning::OncePerModel => self.flagged.contains(model),
        }
    }

    /// Compare `original` and `restored` with `compare`.
    ///
    /// `preview` is the raw (source, restored) pair shown on the first mismatch.
    /// Returns whether the two matched. Errors from `compare` propagate.
    pub fn check<T>(
        &mut self,
        model: &str,
        image_index: usize,
        original: &T,
        restored: &T,
        compare: impl Fn(&T, &T) -> Result<bool>,
        preview: (&RawImage, &RawImage),
    ) -> Result<bool> {
        if compare(original, restored)? {
            return Ok(true);
        }

        if !self.suppressed(model) {
            let (source, loaded) = preview;
            let psnr = psnr(source, loaded);
            tracing::warn!(
                model,
                image_index,
                psnr = ?psnr,
                "Pre-compressed image and post-decompressed image don't match"
            );
            if let Some(viewer) = &self.viewer {
                show_side_by_side(viewer.as_ref(), model, image_index, source, loaded);
            }
            self.diagnostics.push(Diagnostic {
                model: model.to_string(),
                image_index,
                psnr,
            });
        }

        self.lossy = true;
        self.flagged.insert(model.to_string());
        Ok(false)
    }
}

/// Show both images concurrently and wait for both. Every failure is dropped.
///
/// `catch_unwind` does not silence the panic hook, so a panicking viewer still
/// prints its message.
fn show_side_by_side(
    viewer: &dyn ImageViewer,
    model: &str,
    image_index: usize,
    source: &RawImage,
    restored: &RawImage,
) {
    let show = |label: String, image: &RawImage| {
        let _ = panic::catch_unwind(AssertUnwindSafe(|| viewer.show(&label, image)));
    };
    rayon::join(
        || show(format!("{model}-{image_index}-original"), source),
        || show(format!("{model}-{image_index}-restored"), restored),
    );
}

/// Viewer that dumps previews as binary PGM/PPM files into a directory.
///
/// Two-channel images keep their first channel; four-channel images drop alpha.
#[derive(Debug, Clone)]
pub struct PnmDumpViewer {
    dir: PathBuf,
}

impl PnmDumpViewer {
    /// Write previews into `dir` (created on first use).
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ImageViewer for PnmDumpViewer {
    fn show(&self, label: &str, image: &RawImage) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let (height, width, channels) = image.shape();
        let preview = image.to_u8_preview();

        let (magic, ext, keep) = if channels >= 3 { ("P6", "ppm", 3) } else { ("P5", "pgm", 1) };
        let mut data = format!("{magic}\n{width} {height}\n255\n").into_bytes();
        data.reserve(width * height * keep);
        for px in preview.chunks_exact(channels) {
            data.extend_from_slice(&px[..keep]);
        }

        fs::write(self.dir.join(format!("{label}.{ext}")), data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use std::sync::Mutex;

    fn eq(a: &Vec<u8>, b: &Vec<u8>) -> Result<bool> {
        Ok(a == b)
    }

    fn raw(v: u8) -> RawImage {
        RawImage::from_u8(1, 2, 1, vec![v, v]).unwrap()
    }

    #[derive(Default)]
    struct RecordingViewer {
        labels: Mutex<Vec<String>>,
    }

    impl ImageViewer for RecordingViewer {
        fn show(&self, label: &str, _image: &RawImage) -> Result<()> {
            self.labels.lock().unwrap().push(label.to_string());
            Ok(())
        }
    }

    struct PanickingViewer;

    impl ImageViewer for PanickingViewer {
        fn show(&self, _label: &str, _image: &RawImage) -> Result<()> {
            panic!("no display available");
        }
    }

    #[test]
    fn test_match_leaves_flag_clear() {
        let mut checker = FidelityChecker::new(LossyWarning::OncePerRun, None);
        let a = vec![1u8, 2];
        let ok = checker
            .check("m", 0, &a, &a.clone(), eq, (&raw(1), &raw(1)))
            .unwrap();
        assert!(ok);
        assert!(!checker.is_lossy());
        assert!(checker.diagnostics().is_empty());
    }

    #[test]
    fn test_once_per_run() {
        let mut checker = FidelityChecker::new(LossyWarning::OncePerRun, None);
        let (a, b) = (vec![1u8], vec![2u8]);
        for i in 0..3 {
            assert!(!checker.check("first", i, &a, &b, eq, (&raw(1), &raw(2))).unwrap());
        }
        assert!(!checker.check("second", 0, &a, &b, eq, (&raw(1), &raw(2))).unwrap());

        assert!(checker.is_lossy());
        assert!(checker.is_model_lossy("second"));
        assert_eq!(checker.diagnostics().len(), 1);
        assert_eq!(checker.diagnostics()[0].model, "first");
        assert_eq!(checker.diagnostics()[0].image_index, 0);
    }

    #[test]
    fn test_once_per_model() {
        let mut checker = FidelityChecker::new(LossyWarning::OncePerModel, None);
        let (a, b) = (vec![1u8], vec![2u8]);
        for i in 0..2 {
            checker.check("first", i, &a, &b, eq, (&raw(1), &raw(2))).unwrap();
            checker.check("second", i, &a, &b, eq, (&raw(1), &raw(2))).unwrap();
        }
        let models: Vec<_> = checker.diagnostics().iter().map(|d| d.model.as_str()).collect();
        assert_eq!(models, ["first", "second"]);
    }

    #[test]
    fn test_viewer_shows_both_images_once() {
        let viewer = Arc::new(RecordingViewer::default());
        let mut checker = FidelityChecker::new(LossyWarning::OncePerRun, Some(viewer.clone()));
        let (a, b) = (vec![1u8], vec![2u8]);
        checker.check("m", 4, &a, &b, eq, (&raw(1), &raw(2))).unwrap();
        checker.check("m", 5, &a, &b, eq, (&raw(1), &raw(2))).unwrap();

        let mut labels = viewer.labels.lock().unwrap().clone();
        labels.sort();
        assert_eq!(labels, ["m-4-original", "m-4-restored"]);
    }

    #[test]
    fn test_viewer_panic_is_swallowed() {
        let mut checker = FidelityChecker::new(LossyWarning::OncePerRun, Some(Arc::new(PanickingViewer)));
        let (a, b) = (vec![1u8], vec![2u8]);
        let matched = checker.check("m", 0, &a, &b, eq, (&raw(1), &raw(2))).unwrap();
        assert!(!matched);
        assert_eq!(checker.diagnostics().len(), 1);
    }

    #[test]
    fn test_compare_error_propagates() {
        let mut checker = FidelityChecker::new(LossyWarning::OncePerRun, None);
        let a = vec![1u8];
        let err = checker
            .check(
                "m",
                0,
                &a,
                &a,
                |_: &Vec<u8>, _: &Vec<u8>| Err(Error::codec("m", "compare failed")),
                (&raw(1), &raw(1)),
            )
            .unwrap_err();
        assert!(matches!(err, Error::Codec { .. }));
        assert!(!checker.is_lossy());
    }

    #[test]
    fn test_pnm_dump_viewer_writes_ppm() {
        let dir = tempfile::tempdir().unwrap();
        let viewer = PnmDumpViewer::new(dir.path().join("diag"));
        let img = RawImage::from_u8(1, 2, 4, vec![1, 2, 3, 255, 4, 5, 6, 255]).unwrap();
        viewer.show("x", &img).unwrap();

        let bytes = fs::read(dir.path().join("diag").join("x.ppm")).unwrap();
        assert_eq!(bytes, b"P6\n2 1\n255\n\x01\x02\x03\x04\x05\x06");
    }
}
