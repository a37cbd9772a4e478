//! Raw image arrays as produced by datasets and restored by codecs.
//!
//! A [`RawImage`] is a dense `H x W x C` array in row-major, channel-interleaved
//! order. The element type is kept explicit so the harness can derive the
//! sub-pixel bit depth used in throughput calculations.

use imgref::ImgRef;
use rgb::{RGB8, RGBA8};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Element type of a raw image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SampleKind {
    U8,
    U16,
    U32,
    F32,
    F64,
}

impl SampleKind {
    /// Width of one element in bytes.
    #[must_use]
    pub fn byte_width(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 => 2,
            Self::U32 | Self::F32 => 4,
            Self::F64 => 8,
        }
    }
}

/// Sample storage, one variant per element type.
#[derive(Debug, Clone, PartialEq)]
pub enum Samples {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

impl Samples {
    /// Number of elements.
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::U8(v) => v.len(),
            Self::U16(v) => v.len(),
            Self::U32(v) => v.len(),
            Self::F32(v) => v.len(),
            Self::F64(v) => v.len(),
        }
    }

    /// Whether there are no elements.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element type.
    #[must_use]
    pub fn kind(&self) -> SampleKind {
        match self {
            Self::U8(_) => SampleKind::U8,
            Self::U16(_) => SampleKind::U16,
            Self::U32(_) => SampleKind::U32,
            Self::F32(_) => SampleKind::F32,
            Self::F64(_) => SampleKind::F64,
        }
    }
}

/// A dense `H x W x C` image array.
#[derive(Debug, Clone, PartialEq)]
pub struct RawImage {
    height: usize,
    width: usize,
    channels: usize,
    samples: Samples,
}

impl RawImage {
    /// Create an image, checking that the sample count equals `height * width * channels`.
    pub fn new(height: usize, width: usize, channels: usize, samples: Samples) -> Result<Self> {
        let expected = shape_len(height, width, channels);
        if expected == 0 {
            return Err(Error::EmptyImage {
                height,
                width,
                channels,
            });
        }
        if samples.len() != expected {
            return Err(Error::ShapeMismatch {
                height,
                width,
                channels,
                expected,
                actual: samples.len(),
            });
        }
        Ok(Self {
            height,
            width,
            channels,
            samples,
        })
    }

    /// Create an 8-bit image.
    pub fn from_u8(height: usize, width: usize, channels: usize, data: Vec<u8>) -> Result<Self> {
        Self::new(height, width, channels, Samples::U8(data))
    }

    /// Create a 16-bit image.
    pub fn from_u16(height: usize, width: usize, channels: usize, data: Vec<u16>) -> Result<Self> {
        Self::new(height, width, channels, Samples::U16(data))
    }

    /// Create a 3-channel image from an `imgref` RGB buffer (stride is honoured).
    pub fn from_rgb8(img: ImgRef<'_, RGB8>) -> Result<Self> {
        let data: Vec<u8> = img.pixels().flat_map(|p| [p.r, p.g, p.b]).collect();
        Self::from_u8(img.height(), img.width(), 3, data)
    }

    /// Create a 4-channel image from an `imgref` RGBA buffer.
    pub fn from_rgba8(img: ImgRef<'_, RGBA8>) -> Result<Self> {
        let data: Vec<u8> = img.pixels().flat_map(|p| [p.r, p.g, p.b, p.a]).collect();
        Self::from_u8(img.height(), img.width(), 4, data)
    }

    /// Create a single-channel image from an `imgref` grayscale buffer.
    pub fn from_gray8(img: ImgRef<'_, u8>) -> Result<Self> {
        let data: Vec<u8> = img.pixels().collect();
        Self::from_u8(img.height(), img.width(), 1, data)
    }

    /// Rebuild an image from little-endian element bytes.
    pub fn from_le_bytes(
        height: usize,
        width: usize,
        channels: usize,
        kind: SampleKind,
        bytes: &[u8],
    ) -> Result<Self> {
        let bw = kind.byte_width();
        if bytes.len() % bw != 0 {
            return Err(Error::ShapeMismatch {
                height,
                width,
                channels,
                expected: shape_len(height, width, channels),
                actual: bytes.len() / bw,
            });
        }
        let chunks = bytes.chunks_exact(bw);
        let samples = match kind {
            SampleKind::U8 => Samples::U8(bytes.to_vec()),
            SampleKind::U16 => {
                Samples::U16(chunks.map(|c| u16::from_le_bytes([c[0], c[1]])).collect())
            }
            SampleKind::U32 => Samples::U32(
                chunks
                    .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            SampleKind::F32 => Samples::F32(
                chunks
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            SampleKind::F64 => Samples::F64(
                chunks
                    .map(|c| {
                        let mut b = [0u8; 8];
                        b.copy_from_slice(c);
                        f64::from_le_bytes(b)
                    })
                    .collect(),
            ),
        };
        Self::new(height, width, channels, samples)
    }

    /// Serialize the elements as little-endian bytes.
    #[must_use]
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match &self.samples {
            Samples::U8(v) => v.clone(),
            Samples::U16(v) => v.iter().flat_map(|s| s.to_le_bytes()).collect(),
            Samples::U32(v) => v.iter().flat_map(|s| s.to_le_bytes()).collect(),
            Samples::F32(v) => v.iter().flat_map(|s| s.to_le_bytes()).collect(),
            Samples::F64(v) => v.iter().flat_map(|s| s.to_le_bytes()).collect(),
        }
    }

    /// Image height.
    #[must_use]
    pub fn height(&self) -> usize {
        self.height
    }

    /// Image width.
    #[must_use]
    pub fn width(&self) -> usize {
        self.width
    }

    /// Channel count.
    #[must_use]
    pub fn channels(&self) -> usize {
        self.channels
    }

    /// `(height, width, channels)`.
    #[must_use]
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.height, self.width, self.channels)
    }

    /// Element count, `H * W * C`. Never zero.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Always false; empty images are rejected at construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Element type.
    #[must_use]
    pub fn sample_kind(&self) -> SampleKind {
        self.samples.kind()
    }

    /// Width of one element in bytes.
    #[must_use]
    pub fn element_byte_width(&self) -> usize {
        self.sample_kind().byte_width()
    }

    /// Bits per sub-pixel of the uncompressed representation.
    #[must_use]
    pub fn pixel_bits(&self) -> u32 {
        (self.element_byte_width() * 8) as u32
    }

    /// Borrow the samples.
    #[must_use]
    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    /// Mutably borrow the samples. The variant must not be replaced by one of a different length.
    pub fn samples_mut(&mut self) -> &mut Samples {
        &mut self.samples
    }

    /// Consume the image and return its samples.
    #[must_use]
    pub fn into_samples(self) -> Samples {
        self.samples
    }

    /// Largest representable value, used as the PSNR peak.
    ///
    /// Float images are assumed to be normalized to `[0, 1]`.
    #[must_use]
    pub fn peak(&self) -> f64 {
        match self.sample_kind() {
            SampleKind::U8 => f64::from(u8::MAX),
            SampleKind::U16 => f64::from(u16::MAX),
            SampleKind::U32 => f64::from(u32::MAX),
            SampleKind::F32 | SampleKind::F64 => 1.0,
        }
    }

    /// Iterate the elements widened to `f64`.
    pub fn iter_f64(&self) -> Box<dyn Iterator<Item = f64> + '_> {
        match &self.samples {
            Samples::U8(v) => Box::new(v.iter().map(|&s| f64::from(s))),
            Samples::U16(v) => Box::new(v.iter().map(|&s| f64::from(s))),
            Samples::U32(v) => Box::new(v.iter().map(|&s| f64::from(s))),
            Samples::F32(v) => Box::new(v.iter().map(|&s| f64::from(s))),
            Samples::F64(v) => Box::new(v.iter().copied()),
        }
    }

    /// Elements rescaled to 8 bits, for previews.
    #[must_use]
    pub fn to_u8_preview(&self) -> Vec<u8> {
        if let Samples::U8(v) = &self.samples {
            return v.clone();
        }
        let peak = self.peak();
        self.iter_f64()
            .map(|s| ((s / peak).clamp(0.0, 1.0) * 255.0).round() as u8)
            .collect()
    }
}

/// `height * width * channels`, saturating at `usize::MAX`.
///
/// No buffer can hold `usize::MAX` elements, so an overflowing shape always fails
/// the length check.
fn shape_len(height: usize, width: usize, channels: usize) -> usize {
    height.saturating_mul(width).saturating_mul(channels)
}
