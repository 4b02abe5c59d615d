//! Memory-mapped output file for patched images.
//!
//! [`Output`] creates the target file at its final size, maps it and lets the image copy
//! its bytes in. A file that is dropped without [`Output::finalize`] having succeeded is
//! removed again, so an interrupted save never leaves a half-written image behind.
//!
//! # Examples
//!
//! ```rust,no_run
//! use snespatch::image::Output;
//!
//! let mut output = Output::create("patched.sfc", 0x40_0000)?;
//! output.write_at(0, &[0x78, 0x18, 0xFB])?;
//! output.finalize()?;
//! # Ok::<(), snespatch::Error>(())
//! ```

use std::path::{Path, PathBuf};

use memmap2::{MmapMut, MmapOptions};

use crate::{Error, Result};

/// A memory-mapped output file that is removed unless finalized.
///
/// All writes are bounds-checked against the size given at creation.
pub struct Output {
    /// The memory mapping of the target file
    mmap: MmapMut,

    /// The target path
    target_path: PathBuf,

    /// Whether the file has been finalized
    finalized: bool,
}

impl Output {
    /// Creates `target_path` with a length of `size` bytes and maps it for writing.
    ///
    /// An existing file at `target_path` is truncated.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::WriteMmapFailed`] in the following cases:
    /// - Target file creation fails
    /// - File size setting fails
    /// - Memory mapping creation fails
    pub fn create<P: AsRef<Path>>(target_path: P, size: u64) -> Result<Self> {
        let target_path = target_path.as_ref().to_path_buf();

        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&target_path)
            .map_err(|e| Error::WriteMmapFailed {
                message: format!("Failed to create target file: {e}"),
            })?;

        file.set_len(size).map_err(|e| Error::WriteMmapFailed {
            message: format!("Failed to set file size: {e}"),
        })?;

        let mmap = unsafe {
            MmapOptions::new()
                .map_mut(&file)
                .map_err(|e| Error::WriteMmapFailed {
                    message: format!("Failed to create memory mapping: {e}"),
                })?
        };

        Ok(Self {
            mmap,
            target_path,
            finalized: false,
        })
    }

    /// Copies `data` into the file at `offset`.
    ///
    /// # Errors
    /// Returns [`crate::Error::WriteMmapFailed`] if the write would exceed the file size.
    pub fn write_at(&mut self, offset: u64, data: &[u8]) -> Result<()> {
        let exceeds = || Error::WriteMmapFailed {
            message: format!(
                "Write would exceed file size: offset={}, len={}, file_size={}",
                offset,
                data.len(),
                self.mmap.len()
            ),
        };

        let start = usize::try_from(offset).map_err(|_| exceeds())?;
        let end = start.checked_add(data.len()).ok_or_else(exceeds)?;
        if end > self.mmap.len() {
            return Err(exceeds());
        }

        self.mmap[start..end].copy_from_slice(data);
        Ok(())
    }

    /// Size of the file in bytes.
    pub fn size(&self) -> u64 {
        self.mmap.len() as u64
    }

    /// Flushes pending writes to disk without finalizing.
    ///
    /// # Errors
    /// Returns [`crate::Error::WriteMmapFailed`] if the flush operation fails.
    pub fn flush(&mut self) -> Result<()> {
        self.mmap.flush().map_err(|e| Error::WriteMmapFailed {
            message: format!("Failed to flush memory mapping: {e}"),
        })
    }

    /// Flushes the mapping and keeps the file.
    ///
    /// # Errors
    /// Returns [`crate::Error::WriteFinalizationFailed`] if the flush fails. The file is
    /// removed in that case.
    pub fn finalize(mut self) -> Result<()> {
        self.mmap
            .flush()
            .map_err(|e| Error::WriteFinalizationFailed {
                message: format!("Failed to flush memory mapping: {e}"),
            })?;

        self.finalized = true;
        Ok(())
    }

    /// The path the file is written to.
    pub fn target_path(&self) -> &Path {
        &self.target_path
    }
}

impl Drop for Output {
    fn drop(&mut self) {
        if !self.finalized {
            let _ = self.flush();
            let _ = std::fs::remove_file(&self.target_path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn create_and_finalize() {
        let temp_dir = tempdir().unwrap();
        let target_path = temp_dir.path().join("image.sfc");

        {
            let mut output = Output::create(&target_path, 16).unwrap();
            assert_eq!(output.size(), 16);
            assert_eq!(output.target_path(), target_path.as_path());
            output.write_at(4, &[0x5C, 0x00, 0x00, 0xC3]).unwrap();
            output.finalize().unwrap();
        }

        let contents = std::fs::read(&target_path).unwrap();
        assert_eq!(contents.len(), 16);
        assert_eq!(&contents[4..8], &[0x5C, 0x00, 0x00, 0xC3]);
    }

    #[test]
    fn unfinalized_file_is_removed() {
        let temp_dir = tempdir().unwrap();
        let target_path = temp_dir.path().join("partial.sfc");

        {
            let mut output = Output::create(&target_path, 8).unwrap();
            output.write_at(0, b"PARTIAL").unwrap();
            assert!(target_path.exists());
        }

        assert!(!target_path.exists());
    }

    #[test]
    fn bounds_checking() {
        let temp_dir = tempdir().unwrap();
        let target_path = temp_dir.path().join("small.sfc");

        let mut output = Output::create(&target_path, 10).unwrap();
        assert!(output.write_at(8, b"too long").is_err());
        assert!(output.write_at(u64::MAX, &[0]).is_err());
        assert!(output.write_at(9, &[0xEA]).is_ok());
    }
}
