//! Datasets the CLI can benchmark on.

use std::fs;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use codec_bench::{Dataset, Error, RawImage, Result};
use imgref::ImgVec;
use rgb::RGB8;

use crate::models::decode_png;

/// Deterministic synthetic images: smooth gradients alternating with noisy ones.
#[derive(Debug, Clone)]
pub struct SyntheticDataset {
    count: usize,
    width: usize,
    height: usize,
}

impl SyntheticDataset {
    pub fn new(count: usize, width: usize, height: usize) -> Self {
        Self {
            count,
            width,
            height,
        }
    }

    fn image(&self, index: usize) -> Result<RawImage> {
        let (w, h) = (self.width, self.height);
        let mut state = 0x9E37_79B9_7F4A_7C15_u64 ^ index as u64;
        let pixels: Vec<RGB8> = (0..w * h)
            .map(|i| {
                let (x, y) = (i % w, i / w);
                let r = (x * 255 / w.max(1)) as u8;
                let g = (y * 255 / h.max(1)) as u8;
                let b = ((x + y + index * 17) % 256) as u8;
                if index % 2 == 0 {
                    RGB8::new(r, g, b)
                } else {
                    state = xorshift(state);
                    let n = (state & 0x0f) as u8;
                    RGB8::new(r.wrapping_add(n), g ^ n, b.wrapping_sub(n))
                }
            })
            .collect();
        RawImage::from_rgb8(ImgVec::new(pixels, w, h).as_ref())
    }
}

fn xorshift(mut x: u64) -> u64 {
    x ^= x << 13;
    x ^= x >> 7;
    x ^= x << 17;
    x
}

impl Dataset for SyntheticDataset {
    fn images(&self) -> Result<Vec<RawImage>> {
        (0..self.count).map(|i| self.image(i)).collect()
    }
}

/// Every `.png` file in a directory, in file-name order.
#[derive(Debug, Clone)]
pub struct PngDirDataset {
    dir: PathBuf,
    limit: usize,
}

impl PngDirDataset {
    /// Load at most `limit` images from `dir`; zero means no limit.
    pub fn new(dir: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            dir: dir.into(),
            limit,
        }
    }
}

impl Dataset for PngDirDataset {
    fn images(&self) -> Result<Vec<RawImage>> {
        let mut paths: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.extension().and_then(|s| s.to_str()) == Some("png"))
            .collect();
        paths.sort();

        if self.limit > 0 && paths.len() > self.limit {
            paths.truncate(self.limit);
        }
        if paths.is_empty() {
            return Err(Error::Dataset(format!(
                "no PNG files in {}",
                self.dir.display()
            )));
        }

        paths.iter().map(|p| load_png(p)).collect()
    }
}

fn load_png(path: &Path) -> Result<RawImage> {
    let file = fs::File::open(path)?;
    decode_png(BufReader::new(file))
        .map_err(|e| Error::Dataset(format!("{}: {e}", path.display())))
}
