//! Dataset capability.
//!
//! Anything that can produce a fixed, ordered sequence of images can feed the
//! harness. The harness reads it exactly once, at construction.

use crate::error::Result;
use crate::image::RawImage;

/// Source of benchmark images.
///
/// Implementations must be deterministic: the same images in the same order
/// every time [`Dataset::images`] is called.
pub trait Dataset {
    /// Produce the images in benchmark order.
    fn images(&self) -> Result<Vec<RawImage>>;
}

/// A dataset backed by images already in memory.
#[derive(Debug, Clone, Default)]
pub struct VecDataset {
    images: Vec<RawImage>,
}

impl VecDataset {
    /// Wrap a list of images.
    #[must_use]
    pub fn new(images: Vec<RawImage>) -> Self {
        Self { images }
    }
}

impl Dataset for VecDataset {
    fn images(&self) -> Result<Vec<RawImage>> {
        Ok(self.images.clone())
    }
}
