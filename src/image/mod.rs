//! The mutable cartridge image and its free-space bookkeeping.
//!
//! A [`RomImage`] owns the image bytes, a write cursor and the [`FreeSpaceManager`] of the
//! session. Every write names its effect on the free set ([`FsWriteType`]), so the bytes
//! and the bookkeeping can never drift apart.
//!
//! # Key Components
//!
//! - [`RomImage`] - Image bytes, cursor and free set
//! - [`SnesHeader`] - Read-only view of the internal cartridge header
//! - [`Output`] - Memory-mapped output file used when saving
//!
//! # Loading
//!
//! [`RomImage::from_file`] maps the file, strips a copier header and verifies the digest
//! as configured by [`SessionConfig`]. [`RomImage::new`] wraps bytes that are already in
//! memory and applies no checks beyond the size of the mapping.
//!
//! # Examples
//!
//! ```rust
//! use snespatch::{ByteRange, FsWriteType, Mapping, RomImage};
//!
//! let mut image = RomImage::new(vec![0xFF; 0x2_0000], Mapping::HiRom)?;
//! image.scan_padding(0xFF, 0x100, None)?;
//!
//! let addr = image.space().get_free_addr(4, None)?;
//! image.seek(addr)?;
//! image.write(&[0xA9, 0x01, 0x00, 0x6B], FsWriteType::MarkUsed)?;
//!
//! assert_eq!(image.tell(), addr + 4);
//! assert!(!image.space().is_free(&ByteRange::from_len(addr, 4)?));
//! # Ok::<(), snespatch::Error>(())
//! ```

mod header;
mod output;

pub use header::{compute_checksum, fix_checksum, header_base, SnesHeader, HEADER_SIZE};
pub use output::Output;

use std::{fs, path::Path};

use log::{debug, trace, warn};
use md5::{Digest, Md5};
use memmap2::Mmap;

use crate::{
    address::Mapping,
    config::{md5_to_hex, SessionConfig},
    freespace::{ByteRange, FreeSpaceManager, FsWriteType},
    Error, Result,
};

/// Size of the header some backup devices prepend to a dump.
pub const COPIER_HEADER_SIZE: usize = 0x200;

/// A cartridge image being patched.
#[derive(Debug, Clone)]
pub struct RomImage {
    data: Vec<u8>,
    cursor: u32,
    space: FreeSpaceManager,
    config: SessionConfig,
}

impl RomImage {
    /// Wraps `data` without any validation beyond its size.
    ///
    /// The free set starts empty and the bank boundary is not enforced; use
    /// [`RomImage::from_mem`] to apply a full [`SessionConfig`].
    ///
    /// # Errors
    ///
    /// - [`Error::Empty`] if `data` is empty
    /// - [`Error::OutOfRange`] if `data` is larger than `mapping` can address
    pub fn new(data: Vec<u8>, mapping: Mapping) -> Result<Self> {
        Self::from_mem(data, &SessionConfig::minimal().with_mapping(mapping))
    }

    /// Creates an image from bytes in memory according to `config`.
    ///
    /// # Errors
    ///
    /// - [`Error::Empty`] if `data` is empty (after removing a copier header)
    /// - [`Error::OutOfRange`] if `data` is larger than the mapping can address
    /// - [`Error::HashMismatch`] if the digest differs from `config.expected_md5`
    /// - [`Error::Malformed`] if `config.require_header` is set and the header is missing or
    ///   its map mode disagrees with the mapping
    pub fn from_mem(mut data: Vec<u8>, config: &SessionConfig) -> Result<Self> {
        if config.strip_copier_header && data.len() % 0x400 == COPIER_HEADER_SIZE {
            debug!("image: stripping {COPIER_HEADER_SIZE:#X} byte copier header");
            data.drain(..COPIER_HEADER_SIZE);
        }

        if data.is_empty() {
            return Err(Error::Empty);
        }

        let capacity = config.mapping.capacity();
        if data.len() > capacity as usize {
            return Err(Error::OutOfRange(capacity));
        }

        if let Some(expected) = config.expected_md5 {
            let actual = Md5::digest(&data);
            if actual.as_slice() != expected.as_slice() {
                return Err(Error::HashMismatch {
                    expected: md5_to_hex(&expected),
                    actual: md5_to_hex(&actual),
                });
            }
        }

        let mut space = FreeSpaceManager::new();
        if config.enforce_bank_boundaries {
            space = space.with_bank_boundary(config.mapping.bank_size());
        }

        let image = RomImage {
            data,
            cursor: 0,
            space,
            config: *config,
        };

        match image.header() {
            Ok(header) if !header.map_mode_matches() => {
                if config.require_header {
                    return Err(malformed_error!(
                        "map mode {:#04X} does not match {}",
                        header.map_mode(),
                        config.mapping
                    ));
                }
                warn!(
                    "image: map mode {:#04X} does not look like {}",
                    header.map_mode(),
                    config.mapping
                );
            }
            Err(_) if config.require_header => {
                return Err(malformed_error!(
                    "no {} header in a {} byte image",
                    config.mapping,
                    image.len()
                ));
            }
            _ => {}
        }

        Ok(image)
    }

    /// Loads an image from disk according to `config`.
    ///
    /// # Errors
    ///
    /// - [`Error::FileError`] if the file cannot be opened or mapped
    /// - any error of [`RomImage::from_mem`]
    pub fn from_file(path: impl AsRef<Path>, config: &SessionConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = fs::File::open(path)?;
        let data = if file.metadata()?.len() == 0 {
            Vec::new()
        } else {
            let mmap = unsafe { Mmap::map(&file) }?;
            mmap.to_vec()
        };

        debug!("image: loaded {} bytes from {}", data.len(), path.display());
        Self::from_mem(data, config)
    }

    /// Image size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the image holds no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// The memory map of the image.
    #[must_use]
    pub fn mapping(&self) -> Mapping {
        self.config.mapping
    }

    /// The configuration the image was loaded with.
    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The free set of the session.
    #[must_use]
    pub fn space(&self) -> &FreeSpaceManager {
        &self.space
    }

    /// Mutable access to the free set.
    pub fn space_mut(&mut self) -> &mut FreeSpaceManager {
        &mut self.space
    }

    /// The image bytes.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Consumes the image and returns its bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    /// Declares `ranges` as free space.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if a range extends past the end of the image. No
    /// range is added in that case.
    pub fn seed_free_space<I: IntoIterator<Item = ByteRange>>(&mut self, ranges: I) -> Result<()> {
        let ranges: Vec<ByteRange> = ranges.into_iter().collect();
        if ranges.iter().any(|range| range.end() as usize > self.data.len()) {
            return Err(Error::OutOfBounds);
        }

        for range in ranges {
            self.space.mark_free(range);
        }
        Ok(())
    }

    /// Adds every run of at least `min_len` bytes equal to `fill` to the free set.
    ///
    /// Only the part of the image inside `within` is scanned when it is given. Returns the
    /// number of bytes found.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if `within` extends past the end of the image.
    pub fn scan_padding(
        &mut self,
        fill: u8,
        min_len: u32,
        within: Option<ByteRange>,
    ) -> Result<u32> {
        let window = match within {
            Some(range) if range.end() as usize > self.data.len() => {
                return Err(Error::OutOfBounds)
            }
            Some(range) => range,
            None => ByteRange::from_len(0, self.data.len() as u32)?,
        };
        let min_len = min_len.max(1);

        let mut found = 0;
        let mut run_start = None;
        for offset in window.start()..=window.end() {
            let is_fill = offset < window.end() && self.data[offset as usize] == fill;
            match (is_fill, run_start) {
                (true, None) => run_start = Some(offset),
                (false, Some(start)) => {
                    if offset - start >= min_len {
                        self.space.mark_free(ByteRange::new(start, offset)?);
                        found += offset - start;
                    }
                    run_start = None;
                }
                _ => {}
            }
        }

        debug!("image: found {found:#X} bytes of {fill:#04X} padding in {window}");
        Ok(found)
    }

    /// Moves the cursor to `offset`.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if `offset` is past the end of the image.
    pub fn seek(&mut self, offset: u32) -> Result<()> {
        if offset as usize > self.data.len() {
            return Err(Error::OutOfBounds);
        }
        self.cursor = offset;
        Ok(())
    }

    /// Current cursor position.
    #[must_use]
    pub fn tell(&self) -> u32 {
        self.cursor
    }

    /// Reads `len` bytes at the cursor and advances it.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if fewer than `len` bytes remain.
    pub fn read(&mut self, len: usize) -> Result<&[u8]> {
        let start = self.cursor as usize;
        let end = start.checked_add(len).ok_or(Error::OutOfBounds)?;
        if end > self.data.len() {
            return Err(Error::OutOfBounds);
        }

        self.cursor = end as u32;
        Ok(&self.data[start..end])
    }

    /// Writes `bytes` at the cursor, advances it and applies `kind` to the written range.
    ///
    /// A [`FsWriteType::MarkUsed`] write checks that the range is free before touching any
    /// byte. Writing nothing is a no-op.
    ///
    /// # Errors
    ///
    /// - [`Error::OutOfBounds`] if the write would extend past the end of the image
    /// - [`Error::AllocationConflict`] if `kind` is `MarkUsed` and the range is not free
    pub fn write(&mut self, bytes: &[u8], kind: FsWriteType) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }

        let start = self.cursor as usize;
        let end = start.checked_add(bytes.len()).ok_or(Error::OutOfBounds)?;
        if end > self.data.len() {
            return Err(Error::OutOfBounds);
        }

        let range = ByteRange::new(self.cursor, end as u32)?;
        if kind == FsWriteType::MarkUsed && !self.space.is_free(&range) {
            return Err(Error::AllocationConflict {
                start: range.start(),
                end: range.end(),
            });
        }

        self.data[start..end].copy_from_slice(bytes);
        self.space.mark(range, kind)?;
        self.cursor = end as u32;

        trace!("image: wrote {range} ({kind:?})");
        Ok(())
    }

    /// The internal header of the image.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if the image is too small to hold one.
    pub fn header(&self) -> Result<SnesHeader<'_>> {
        SnesHeader::parse(&self.data, self.config.mapping)
    }

    /// Recomputes and stores the header checksum, returning it.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if the image is too small to hold a header.
    pub fn fix_checksum(&mut self) -> Result<u16> {
        let checksum = fix_checksum(&mut self.data, self.config.mapping)?;
        debug!("image: header checksum set to {checksum:#06X}");
        Ok(checksum)
    }

    /// MD5 digest of the current bytes as lowercase hex.
    #[must_use]
    pub fn md5(&self) -> String {
        md5_to_hex(&Md5::digest(&self.data))
    }

    /// Saves the image to `path`.
    ///
    /// The header checksum is repaired first if the configuration asks for it and the image
    /// has a header.
    ///
    /// # Errors
    /// Returns [`Error::WriteMmapFailed`] or [`Error::WriteFinalizationFailed`] if the file
    /// cannot be written.
    pub fn write_to_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        if self.config.fix_checksum {
            if self.header().is_ok() {
                self.fix_checksum()?;
            } else {
                warn!("image: no header to repair in a {} byte image", self.data.len());
            }
        }

        let mut output = Output::create(path.as_ref(), self.data.len() as u64)?;
        output.write_at(0, &self.data)?;
        output.finalize()?;

        debug!("image: saved {} bytes to {}", self.data.len(), path.as_ref().display());
        Ok(())
    }
}
