//! Half-open byte ranges over flat file offsets.

use std::fmt;

use crate::{Error, Result};

/// A half-open interval `[start, end)` of flat file offsets.
///
/// A [`ByteRange`] is never empty: construction fails unless `start < end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ByteRange {
    start: u32,
    end: u32,
}

impl ByteRange {
    /// Creates the range `[start, end)`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidRange`] if `start >= end`.
    pub fn new(start: u32, end: u32) -> Result<Self> {
        if start >= end {
            return Err(Error::InvalidRange { start, end });
        }

        Ok(Self { start, end })
    }

    /// Creates the range of `len` bytes beginning at `start`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidRange`] if `len` is zero or the end overflows.
    pub fn from_len(start: u32, len: u32) -> Result<Self> {
        let end = start
            .checked_add(len)
            .ok_or(Error::InvalidRange { start, end: u32::MAX })?;
        Self::new(start, end)
    }

    /// Builds a range the caller already knows to be non-empty.
    pub(crate) const fn new_unchecked(start: u32, end: u32) -> Self {
        debug_assert!(start < end);
        Self { start, end }
    }

    /// First offset in the range.
    #[must_use]
    pub const fn start(&self) -> u32 {
        self.start
    }

    /// One past the last offset in the range.
    #[must_use]
    pub const fn end(&self) -> u32 {
        self.end
    }

    /// Number of bytes in the range; always at least one.
    #[must_use]
    pub const fn len(&self) -> u32 {
        self.end - self.start
    }

    /// Returns `true` if `offset` lies inside the range.
    #[must_use]
    pub const fn contains(&self, offset: u32) -> bool {
        offset >= self.start && offset < self.end
    }

    /// Returns `true` if `other` lies completely inside this range.
    #[must_use]
    pub const fn contains_range(&self, other: &ByteRange) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    /// Returns `true` if both ranges share at least one byte.
    #[must_use]
    pub const fn overlaps(&self, other: &ByteRange) -> bool {
        self.start < other.end && other.start < self.end
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{:#08X}, {:#08X})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn construction() -> Result<()> {
        let range = ByteRange::new(0x10, 0x20)?;
        assert_eq!(range.len(), 0x10);
        assert_eq!(ByteRange::from_len(0x10, 0x10)?, range);

        assert!(matches!(
            ByteRange::new(0x20, 0x20),
            Err(Error::InvalidRange { .. })
        ));
        assert!(ByteRange::new(0x21, 0x20).is_err());
        assert!(ByteRange::from_len(0x10, 0).is_err());
        assert!(ByteRange::from_len(u32::MAX, 2).is_err());
        Ok(())
    }

    #[test]
    fn relations() -> Result<()> {
        let outer = ByteRange::new(0x100, 0x200)?;
        let inner = ByteRange::new(0x180, 0x200)?;
        let touching = ByteRange::new(0x200, 0x210)?;

        assert!(outer.contains(0x100));
        assert!(!outer.contains(0x200));
        assert!(outer.contains_range(&inner));
        assert!(!inner.contains_range(&outer));
        assert!(outer.overlaps(&inner));
        assert!(!outer.overlaps(&touching));
        Ok(())
    }
}
