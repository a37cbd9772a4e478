//! Single-slot scratch storage for compressed artifacts.
//!
//! Every measurement stages exactly one artifact at a fixed, harness-owned path:
//! the codec writes it, the harness reads its size, then deletes it before the
//! next image. [`ScratchSlot::ensure_vacant`] turns a leaked artifact into an
//! error instead of a silently wrong size.

use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Default file name of the scratch artifact.
pub const DEFAULT_FILE_NAME: &str = "img";

/// The single reusable storage location handed to `persist` and `restore` hooks.
#[derive(Debug)]
pub struct ScratchSlot {
    path: PathBuf,
}

impl ScratchSlot {
    /// Create the slot inside `dir`, creating the directory and clearing any stale artifact.
    pub fn create(dir: impl AsRef<Path>, file_name: &str) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;
        let slot = Self {
            path: dir.join(file_name),
        };
        slot.clear()?;
        Ok(slot)
    }

    /// Remove a stale artifact if one is present.
    pub fn clear(&self) -> Result<()> {
        if self.is_occupied() {
            tracing::debug!(path = %self.path.display(), "removing stale scratch artifact");
            fs::remove_file(&self.path)?;
        }
        Ok(())
    }

    /// Location of the artifact. Codecs that write files themselves use this path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether an artifact currently exists.
    #[must_use]
    pub fn is_occupied(&self) -> bool {
        self.path.exists()
    }

    /// Fail with [`Error::ScratchOccupied`] if an artifact is present.
    pub fn ensure_vacant(&self) -> Result<()> {
        if self.is_occupied() {
            return Err(Error::ScratchOccupied {
                path: self.path.clone(),
            });
        }
        Ok(())
    }

    /// Append bytes to the artifact, creating it if needed.
    pub fn write(&self, bytes: &[u8]) -> Result<()> {
        let mut w = self.writer()?;
        w.write_all(bytes)?;
        w.flush()?;
        Ok(())
    }

    /// Buffered appending writer for streaming encoders.
    pub fn writer(&self) -> Result<BufWriter<File>> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        Ok(BufWriter::new(file))
    }

    /// Read the whole artifact.
    pub fn read(&self) -> Result<Vec<u8>> {
        Ok(fs::read(&self.path)?)
    }

    /// Artifact size in bytes.
    pub fn size(&self) -> Result<u64> {
        Ok(fs::metadata(&self.path)?.len())
    }

    /// Remove the artifact.
    pub fn delete(&self) -> Result<()> {
        fs::remove_file(&self.path)?;
        Ok(())
    }
}

impl Drop for ScratchSlot {
    fn drop(&mut self) {
        if self.path.exists() {
            let _ = fs::remove_file(&self.path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_clears_stale_artifact() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("img"), b"stale").unwrap();

        let slot = ScratchSlot::create(dir.path(), DEFAULT_FILE_NAME).unwrap();
        assert!(!slot.is_occupied());
    }

    #[test]
    fn test_write_size_delete() {
        let dir = tempfile::tempdir().unwrap();
        let slot = ScratchSlot::create(dir.path().join("nested"), "img").unwrap();

        slot.write(b"abc").unwrap();
        slot.write(b"de").unwrap();
        assert_eq!(slot.size().unwrap(), 5);
        assert_eq!(slot.read().unwrap(), b"abcde");

        slot.delete().unwrap();
        assert!(!slot.is_occupied());
        assert!(slot.ensure_vacant().is_ok());
    }

    #[test]
    fn test_write_without_delete_is_detected() {
        let dir = tempfile::tempdir().unwrap();
        let slot = ScratchSlot::create(dir.path(), "img").unwrap();

        slot.write(&[0u8; 4]).unwrap();
        let err = slot.ensure_vacant().unwrap_err();
        assert!(matches!(err, Error::ScratchOccupied { .. }));
    }

    #[test]
    fn test_drop_removes_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = {
            let slot = ScratchSlot::create(dir.path(), "img").unwrap();
            slot.write(b"x").unwrap();
            slot.path().to_path_buf()
        };
        assert!(!path.exists());
    }
}
