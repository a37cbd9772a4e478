//! Model hooks and the per-image measurement protocol.
//!
//! A model is a bundle of hooks that drives one codec:
//!
//! - `preprocess`: raw dataset image → the codec's input type `T1`
//! - `encoder` (optional): `T1` → compressed representation `T2`
//! - `persist`: writes `T1` (auto-saving codecs) or `T2` to the scratch slot
//! - `restore`: reads the scratch slot back into a [`RawImage`]
//! - `compare`: equality over `T1`, defaulting to `PartialEq`
//!
//! Whether the codec encodes separately or saves in one step is carried by the
//! [`Persist`] variant, so an encoder can never be paired with a persist hook of
//! the wrong input type.

pub mod registry;

use std::time::Instant;

use crate::error::Result;
use crate::fidelity::FidelityChecker;
use crate::image::RawImage;
use crate::metrics::MeasurementRow;
use crate::scratch::ScratchSlot;

pub use registry::ModelRegistry;

/// Maps a raw dataset image to the codec's input representation.
pub type PreprocessFn<T1> = Box<dyn Fn(&RawImage) -> Result<T1> + Send + Sync>;

/// Compresses a preprocessed image.
pub type EncodeFn<T1, T2> = Box<dyn Fn(&T1) -> Result<T2> + Send + Sync>;

/// Writes a value to the scratch slot.
pub type PersistFn<T> = Box<dyn Fn(&T, &ScratchSlot) -> Result<()> + Send + Sync>;

/// Reads the scratch slot back into a raw image.
pub type RestoreFn = Box<dyn Fn(&ScratchSlot) -> Result<RawImage> + Send + Sync>;

/// Equality predicate over preprocessed images.
pub type CompareFn<T1> = Box<dyn Fn(&T1, &T1) -> Result<bool> + Send + Sync>;

/// Persist hook, tagged by what it receives.
pub enum Persist<T1, T2> {
    /// Auto-saving codec: compresses and writes the preprocessed image in one step.
    Preprocessed(PersistFn<T1>),
    /// Writes the encoder's output.
    Encoded(PersistFn<T2>),
}

/// The hook that performs a model's main compression action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrimaryAction {
    /// A separate encoder hook, followed by persist.
    Encoder,
    /// The persist hook itself (auto-saving codec).
    Persist,
}

/// Hooks supplied at registration. Every field is optional here; the registry
/// decides whether the combination is acceptable.
///
/// # Example
///
/// ```rust
/// use codec_bench::model::ModelSpec;
/// use codec_bench::image::RawImage;
///
/// let spec = ModelSpec::<RawImage>::new()
///     .identity_preprocess()
///     .auto_save(|img: &RawImage, slot| slot.write(&img.to_le_bytes()))
///     .restore(|slot| {
///         RawImage::from_u8(2, 2, 1, slot.read()?)
///     });
/// ```
pub struct ModelSpec<T1, T2 = T1> {
    pub preprocess: Option<PreprocessFn<T1>>,
    pub encoder: Option<EncodeFn<T1, T2>>,
    pub persist: Option<Persist<T1, T2>>,
    pub restore: Option<RestoreFn>,
    pub compare: Option<CompareFn<T1>>,
}

impl<T1, T2> Default for ModelSpec<T1, T2> {
    fn default() -> Self {
        Self {
            preprocess: None,
            encoder: None,
            persist: None,
            restore: None,
            compare: None,
        }
    }
}

impl<T1, T2> ModelSpec<T1, T2> {
    /// An empty spec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the preprocess hook.
    #[must_use]
    pub fn preprocess(
        mut self,
        f: impl Fn(&RawImage) -> Result<T1> + Send + Sync + 'static,
    ) -> Self {
        self.preprocess = Some(Box::new(f));
        self
    }

    /// Set the encoder hook.
    #[must_use]
    pub fn encoder(mut self, f: impl Fn(&T1) -> Result<T2> + Send + Sync + 'static) -> Self {
        self.encoder = Some(Box::new(f));
        self
    }

    /// Set a persist hook that receives the preprocessed image (auto-saving codec).
    #[must_use]
    pub fn auto_save(
        mut self,
        f: impl Fn(&T1, &ScratchSlot) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.persist = Some(Persist::Preprocessed(Box::new(f)));
        self
    }

    /// Set a persist hook that receives the encoder's output.
    #[must_use]
    pub fn persist_encoded(
        mut self,
        f: impl Fn(&T2, &ScratchSlot) -> Result<()> + Send + Sync + 'static,
    ) -> Self {
        self.persist = Some(Persist::Encoded(Box::new(f)));
        self
    }

    /// Set the restore hook.
    #[must_use]
    pub fn restore(
        mut self,
        f: impl Fn(&ScratchSlot) -> Result<RawImage> + Send + Sync + 'static,
    ) -> Self {
        self.restore = Some(Box::new(f));
        self
    }

    /// Set the comparison hook.
    #[must_use]
    pub fn compare(mut self, f: impl Fn(&T1, &T1) -> Result<bool> + Send + Sync + 'static) -> Self {
        self.compare = Some(Box::new(f));
        self
    }
}

impl<T2> ModelSpec<RawImage, T2> {
    /// Benchmark the raw dataset image as-is.
    #[must_use]
    pub fn identity_preprocess(self) -> Self {
        self.preprocess(|img| Ok(img.clone()))
    }
}

impl<T1, T2> ModelSpec<T1, T2>
where
    T1: PartialEq + 'static,
    T2: 'static,
{
    /// Check the hook combination, filling in the default comparison.
    ///
    /// Rejected: missing preprocess, persist or restore; an encoder paired with an
    /// auto-saving persist; an encoded persist without an encoder.
    pub(crate) fn validate(self) -> Option<ModelEntry<T1, T2>> {
        let preprocess = self.preprocess?;
        let restore = self.restore?;
        let compression = match (self.encoder, self.persist?) {
            (None, Persist::Preprocessed(persist)) => Compression::AutoSave(persist),
            (Some(encoder), Persist::Encoded(persist)) => Compression::Encode { encoder, persist },
            _ => return None,
        };
        let compare = self
            .compare
            .unwrap_or_else(|| Box::new(|a: &T1, b: &T1| -> Result<bool> { Ok(a == b) }));

        Some(ModelEntry {
            preprocess,
            compression,
            restore,
            compare,
        })
    }
}

enum Compression<T1, T2> {
    AutoSave(PersistFn<T1>),
    Encode {
        encoder: EncodeFn<T1, T2>,
        persist: PersistFn<T2>,
    },
}

/// A validated model.
pub(crate) struct ModelEntry<T1, T2> {
    preprocess: PreprocessFn<T1>,
    compression: Compression<T1, T2>,
    restore: RestoreFn,
    compare: CompareFn<T1>,
}

/// One image of the dataset, as seen by a measurement.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Sample<'a> {
    pub index: usize,
    pub image: &'a RawImage,
    /// Cached `H * W * C` of `image`.
    pub elements: usize,
}

/// Type-erased model, so codecs with different representations share one registry.
pub(crate) trait BenchModel: Send + Sync {
    fn primary_action(&self) -> PrimaryAction;

    /// Run the full encode → write → read → compare protocol for one image.
    ///
    /// Returns the metrics and whether the round trip matched.
    fn measure(
        &self,
        name: &str,
        sample: Sample<'_>,
        slot: &ScratchSlot,
        fidelity: &mut FidelityChecker,
    ) -> Result<(MeasurementRow, bool)>;
}

impl<T1, T2> BenchModel for ModelEntry<T1, T2>
where
    T1: 'static,
    T2: 'static,
{
    fn primary_action(&self) -> PrimaryAction {
        match self.compression {
            Compression::AutoSave(_) => PrimaryAction::Persist,
            Compression::Encode { .. } => PrimaryAction::Encoder,
        }
    }

    fn measure(
        &self,
        name: &str,
        sample: Sample<'_>,
        slot: &ScratchSlot,
        fidelity: &mut FidelityChecker,
    ) -> Result<(MeasurementRow, bool)> {
        slot.ensure_vacant()?;
        let original = (self.preprocess)(sample.image)?;

        let start = Instant::now();
        let encoded = match &self.compression {
            Compression::AutoSave(persist) => {
                persist(&original, slot)?;
                None
            }
            Compression::Encode { encoder, persist } => {
                let encoded = encoder(&original)?;
                persist(&encoded, slot)?;
                Some(encoded)
            }
        };
        let encode_time = start.elapsed();
        drop(encoded);

        let start = Instant::now();
        let loaded = (self.restore)(slot)?;
        let decode_time = start.elapsed();
        let pixel_bits = loaded.pixel_bits();

        let restored = (self.preprocess)(&loaded)?;
        let matched = fidelity.check(
            name,
            sample.index,
            &original,
            &restored,
            &self.compare,
            (sample.image, &loaded),
        )?;

        let artifact_bytes = slot.size()?;
        slot.delete()?;

        let row = MeasurementRow::from_raw(
            artifact_bytes,
            sample.elements,
            pixel_bits,
            encode_time,
            decode_time,
        );
        tracing::debug!(
            model = name,
            image = sample.index,
            artifact_bytes,
            bpsp = row.bpsp,
            encode_us = encode_time.as_micros() as u64,
            decode_us = decode_time.as_micros() as u64,
            matched,
            "measured"
        );
        Ok((row, matched))
    }
}
