//! Free-space tracking and allocation for a single patch session.
//!
//! This module provides the [`FreeSpaceManager`], which records which byte ranges of an
//! image are unused and hands out addresses for injected routines. It is the component
//! that guarantees no byte is ever handed out twice within one session.
//!
//! # Key Components
//!
//! - [`FreeSpaceManager`] - Ordered set of disjoint, coalesced free ranges
//! - [`ByteRange`] - Half-open interval of flat file offsets
//! - [`FsWriteType`] - How an image write affects the free set
//!
//! # Allocation Strategy
//!
//! Allocation is deterministic so that identical inputs produce byte-identical images:
//!
//! 1. **Hint**: when a hint is given, the lowest placement at or after the hint that
//!    fits is used. This keeps related routines close together.
//! 2. **First fit**: otherwise, or if nothing fits after the hint, the lowest placement in
//!    the whole free set is used.
//!
//! [`FreeSpaceManager::get_free_addr`] only finds an address; the range becomes owned once
//! it is passed to [`FreeSpaceManager::mark_used`]. The image performs both steps as one
//! write (see [`crate::RomImage::write`]).
//!
//! When a bank boundary is configured, a placement never straddles two banks. Code that is
//! entered through a long call runs with a fixed program bank and cannot fall through
//! into the next one.
//!
//! # Examples
//!
//! ```rust
//! use snespatch::{ByteRange, FreeSpaceManager};
//!
//! let mut space = FreeSpaceManager::from_ranges([ByteRange::new(0x1000, 0x2000)?]);
//!
//! let addr = space.get_free_addr(0x10, None)?;
//! space.mark_used(ByteRange::from_len(addr, 0x10)?)?;
//!
//! assert_eq!(addr, 0x1000);
//! assert_eq!(space.total_free(), 0xFF0);
//! # Ok::<(), snespatch::Error>(())
//! ```
//!
//! # Thread Safety
//!
//! [`FreeSpaceManager`] holds no interior mutability. Every mutation takes `&mut self`, so
//! allocate-then-mark sequences are serialized by the borrow checker for as long as the
//! owning image is borrowed mutably.

mod range;

use std::{collections::BTreeMap, fmt};

use log::debug;

pub use range::ByteRange;

use crate::{Error, Result};

/// Effect of an image write on the free set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FsWriteType {
    /// The written range becomes used; it must be entirely free beforehand
    MarkUsed,
    /// The written range is returned to the free set
    MarkFree,
    /// The free set is left untouched
    #[default]
    NoMark,
}

/// Tracks the free byte ranges of an image.
///
/// Free ranges are stored by start offset. The manager upholds two invariants after every
/// operation: no two free ranges overlap, and no two free ranges touch (adjacent ranges are
/// merged into one).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreeSpaceManager {
    /// Free ranges, keyed by start offset and mapping to the (exclusive) end offset
    free: BTreeMap<u32, u32>,
    /// If set, allocations never cross a multiple of this size
    bank_size: Option<u32>,
}

impl FreeSpaceManager {
    /// Creates a manager with no free space.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager seeded with the given free ranges.
    ///
    /// Overlapping or adjacent seed ranges are merged.
    #[must_use]
    pub fn from_ranges<I: IntoIterator<Item = ByteRange>>(ranges: I) -> Self {
        let mut manager = Self::new();
        for range in ranges {
            manager.mark_free(range);
        }
        manager
    }

    /// Prevents allocations from straddling a multiple of `bank_size`.
    ///
    /// A `bank_size` of zero disables the restriction.
    #[must_use]
    pub fn with_bank_boundary(mut self, bank_size: u32) -> Self {
        self.bank_size = (bank_size != 0).then_some(bank_size);
        self
    }

    /// The configured bank boundary, if any.
    #[must_use]
    pub fn bank_boundary(&self) -> Option<u32> {
        self.bank_size
    }

    /// Finds the start of a free range able to hold `length` contiguous bytes.
    ///
    /// The free set is not modified; pass the result to [`FreeSpaceManager::mark_used`] to
    /// claim it.
    ///
    /// # Arguments
    ///
    /// * `length` - Number of contiguous bytes needed
    /// * `hint` - Preferred lower bound for the placement
    ///
    /// # Errors
    ///
    /// - [`Error::Empty`] if `length` is zero
    /// - [`Error::InsufficientSpace`] if no free range is large enough
    pub fn get_free_addr(&self, length: u32, hint: Option<u32>) -> Result<u32> {
        if length == 0 {
            return Err(Error::Empty);
        }

        let hinted = hint.and_then(|from| self.first_fit(length, from));
        let addr = match hinted {
            Some(addr) => addr,
            None => self
                .first_fit(length, 0)
                .ok_or_else(|| self.insufficient(length))?,
        };

        debug!("free space: {length:#X} bytes at {addr:#08X} (hint {hint:X?})");
        Ok(addr)
    }

    /// Removes `range` from the free set.
    ///
    /// # Errors
    /// Returns [`Error::AllocationConflict`] if any byte of `range` is already used.
    pub fn mark_used(&mut self, range: ByteRange) -> Result<()> {
        let (start, end) = self
            .containing(&range)
            .ok_or(Error::AllocationConflict {
                start: range.start(),
                end: range.end(),
            })?;

        self.free.remove(&start);
        if start < range.start() {
            self.free.insert(start, range.start());
        }
        if range.end() < end {
            self.free.insert(range.end(), end);
        }

        debug!("free space: marked {range} used");
        Ok(())
    }

    /// Returns `range` to the free set, merging it with touching and overlapping ranges.
    pub fn mark_free(&mut self, range: ByteRange) {
        let mut start = range.start();
        let mut end = range.end();

        if let Some((&prev_start, &prev_end)) = self.free.range(..=start).next_back() {
            if prev_end >= start {
                self.free.remove(&prev_start);
                start = prev_start;
                end = end.max(prev_end);
            }
        }

        let absorbed: Vec<u32> = self.free.range(start..=end).map(|(&s, _)| s).collect();
        for next_start in absorbed {
            if let Some(next_end) = self.free.remove(&next_start) {
                end = end.max(next_end);
            }
        }

        self.free.insert(start, end);
        debug!("free space: marked {range} free");
    }

    /// Applies `kind` to `range`.
    ///
    /// # Errors
    /// Returns [`Error::AllocationConflict`] if `kind` is [`FsWriteType::MarkUsed`] and the
    /// range is not entirely free.
    pub fn mark(&mut self, range: ByteRange, kind: FsWriteType) -> Result<()> {
        match kind {
            FsWriteType::MarkUsed => self.mark_used(range),
            FsWriteType::MarkFree => {
                self.mark_free(range);
                Ok(())
            }
            FsWriteType::NoMark => Ok(()),
        }
    }

    /// Returns `true` if every byte of `range` is free.
    #[must_use]
    pub fn is_free(&self, range: &ByteRange) -> bool {
        self.containing(range).is_some()
    }

    /// Total number of free bytes.
    #[must_use]
    pub fn total_free(&self) -> u32 {
        self.free.iter().map(|(start, end)| end - start).sum()
    }

    /// Size of the largest contiguous free block.
    #[must_use]
    pub fn largest_free_block(&self) -> u32 {
        self.free
            .iter()
            .map(|(start, end)| end - start)
            .max()
            .unwrap_or(0)
    }

    /// Size of the largest block a single request can get.
    ///
    /// Equals [`FreeSpaceManager::largest_free_block`] unless a bank boundary is set, in which
    /// case each free range only counts up to the bank boundaries that cut it.
    #[must_use]
    pub fn largest_placeable_block(&self) -> u32 {
        let Some(bank) = self.bank_size else {
            return self.largest_free_block();
        };

        let mut largest = 0;
        for (&start, &end) in &self.free {
            let mut piece = start;
            while piece < end {
                let piece_end = ((piece / bank).saturating_add(1))
                    .saturating_mul(bank)
                    .min(end);
                largest = largest.max(piece_end - piece);
                piece = piece_end;
            }
        }
        largest
    }

    /// Returns `true` if any byte of `range` is free.
    #[must_use]
    pub fn intersects(&self, range: &ByteRange) -> bool {
        self.free
            .range(..range.end())
            .next_back()
            .is_some_and(|(_, &end)| end > range.start())
    }

    /// Iterates over the free ranges in ascending order.
    pub fn free_ranges(&self) -> impl Iterator<Item = ByteRange> + '_ {
        self.free
            .iter()
            .map(|(&start, &end)| ByteRange::new_unchecked(start, end))
    }

    /// Number of disjoint free ranges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.free.len()
    }

    /// Returns `true` if no free space is left.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.free.is_empty()
    }

    /// The free range that fully contains `range`, as `(start, end)`.
    fn containing(&self, range: &ByteRange) -> Option<(u32, u32)> {
        self.free
            .range(..=range.start())
            .next_back()
            .filter(|(_, &end)| end >= range.end())
            .map(|(&start, &end)| (start, end))
    }

    /// Lowest placement of `length` bytes that starts at or after `from`.
    fn first_fit(&self, length: u32, from: u32) -> Option<u32> {
        let first = self
            .free
            .range(..=from)
            .next_back()
            .filter(|(_, &end)| end > from)
            .map_or(from, |(&start, _)| start);

        self.free
            .range(first..)
            .find_map(|(&start, &end)| self.place(start.max(from), end, length))
    }

    /// Places `length` bytes at or after `candidate` without passing `end`.
    fn place(&self, mut candidate: u32, end: u32, length: u32) -> Option<u32> {
        if let Some(bank) = self.bank_size {
            if length > bank {
                return None;
            }

            let last = candidate.checked_add(length - 1)?;
            if candidate / bank != last / bank {
                candidate = (last / bank) * bank;
            }
        }

        let placed_end = candidate.checked_add(length)?;
        (placed_end <= end).then_some(candidate)
    }

    fn insufficient(&self, requested: u32) -> Error {
        Error::InsufficientSpace {
            requested,
            free_bytes: self.total_free(),
            largest_block: self.largest_placeable_block(),
        }
    }
}

impl fmt::Display for FreeSpaceManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:#X} bytes free in {} blocks (largest {:#X})",
            self.total_free(),
            self.len(),
            self.largest_free_block()
        )?;
        for range in self.free_ranges() {
            writeln!(f, "  {range} {:#X}", range.len())?;
        }
        Ok(())
    }
}
