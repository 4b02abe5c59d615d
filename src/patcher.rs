//! Code injection into a cartridge image.
//!
//! The [`BinaryPatcher`] combines the assembler, the free-space manager of a [`RomImage`]
//! and the memory map into the two operations used to extend a game:
//!
//! - [`BinaryPatcher::apply_jmp_patch`] redirects execution at a hook into a new routine,
//!   which jumps back on its own when done.
//! - [`BinaryPatcher::add_jsl_routine`] places a shared subroutine that any number of call
//!   sites can reach with `JSL`.
//!
//! # Atomicity
//!
//! Every check happens before the first byte is written: assembly, allocation, address
//! translation, the size of the patch site and the bounds of every write. Once writing
//! starts, a failure leaves the image half patched and is reported as
//! [`Error::SessionCorrupted`]. Nothing is retried or rolled back.
//!
//! # Examples
//!
//! ```rust
//! use snespatch::{
//!     asm::{AsmItem, Instruction, Mnemonic},
//!     BinaryPatcher, ByteRange, Mapping, RomImage,
//! };
//!
//! let mut image = RomImage::new(vec![0u8; 0x4_0000], Mapping::HiRom)?;
//! image.seed_free_space([ByteRange::new(0x3_0000, 0x3_1000)?])?;
//!
//! let mut patcher = BinaryPatcher::new(&mut image);
//! let routine: Vec<AsmItem> = vec![
//!     Instruction::implied(Mnemonic::Inx)?.into(),
//!     Instruction::long(Mnemonic::Jml, 0xC0_8006)?.into(),
//! ];
//!
//! let addr = patcher.apply_jmp_patch(&routine, 0x8000, Some(0x8006))?;
//! assert_eq!(addr, 0x3_0000);
//! assert_eq!(
//!     &image.as_slice()[0x8000..0x8006],
//!     &[0x5C, 0x00, 0x00, 0xC3, 0xEA, 0xEA]
//! );
//! # Ok::<(), snespatch::Error>(())
//! ```

use log::info;

use crate::{
    address::BankedPtr,
    asm::{opcodes::NOP, AsmItem, AsmList, Assemble, Assembler, Instruction, Mnemonic},
    freespace::{ByteRange, FsWriteType},
    image::RomImage,
    Error, Result,
};

/// A hook to install: the routine to run and the bytes it replaces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchRequest {
    /// Routine executed instead of the original code
    pub routine: AsmList,
    /// File offset of the first overwritten byte
    pub hook_addr: u32,
    /// File offset execution returns to; the gap after the jump is filled with `NOP`
    pub return_addr: Option<u32>,
}

impl PatchRequest {
    /// Creates a request that overwrites `[hook_addr, return_addr)`.
    #[must_use]
    pub fn new(routine: AsmList, hook_addr: u32, return_addr: u32) -> Self {
        Self {
            routine,
            hook_addr,
            return_addr: Some(return_addr),
        }
    }
}

/// One pending image write.
struct Write<'b> {
    offset: u32,
    bytes: &'b [u8],
    kind: FsWriteType,
}

/// Injects routines into a [`RomImage`].
///
/// The patcher borrows the image mutably for its whole lifetime, so no other code can
/// allocate from the same free set while a session is running.
pub struct BinaryPatcher<'a, A: Assemble = Assembler> {
    image: &'a mut RomImage,
    assembler: A,
}

impl<'a> BinaryPatcher<'a, Assembler> {
    /// Creates a patcher using the built-in assembler.
    pub fn new(image: &'a mut RomImage) -> Self {
        Self::with_assembler(image, Assembler)
    }
}

impl<'a, A: Assemble> BinaryPatcher<'a, A> {
    /// Creates a patcher using a custom assembler.
    pub fn with_assembler(image: &'a mut RomImage, assembler: A) -> Self {
        Self { image, assembler }
    }

    /// The image being patched.
    #[must_use]
    pub fn image(&self) -> &RomImage {
        self.image
    }

    /// Installs `patch` as a routine reached by a long jump written at `hook_addr`.
    ///
    /// The routine is placed in free space with first fit. If `return_addr` is given, the
    /// bytes between the end of the jump and `return_addr` are overwritten with `NOP` so the
    /// replaced region keeps its length. The routine must transfer control back itself.
    ///
    /// Returns the file offset of the routine.
    ///
    /// # Errors
    ///
    /// - [`Error::Assembly`] if `patch` cannot be assembled
    /// - [`Error::Empty`] if `patch` assembles to no bytes
    /// - [`Error::InsufficientSpace`] if no free range can hold the routine
    /// - [`Error::OutOfRange`] if the routine address cannot be expressed as a pointer
    /// - [`Error::PatchSiteTooSmall`] if the jump does not fit before `return_addr`
    /// - [`Error::OutOfBounds`] if the hook lies outside the image
    /// - [`Error::AllocationConflict`] if any byte of the patch site is still free space
    /// - [`Error::SessionCorrupted`] if a write fails after validation
    pub fn apply_jmp_patch(
        &mut self,
        patch: &[AsmItem],
        hook_addr: u32,
        return_addr: Option<u32>,
    ) -> Result<u32> {
        let routine = self.assemble_routine(patch)?;
        let addr = self
            .image
            .space()
            .get_free_addr(routine_len(&routine), None)?;
        let routine_range = ByteRange::from_len(addr, routine_len(&routine))?;

        let target = self.image.mapping().to_banked_pointer(addr)?;
        let hook = self
            .assembler
            .assemble(&[Instruction::long(Mnemonic::Jml, target.to_u24())?.into()])?;

        let pad = match return_addr {
            Some(return_addr) => vec![NOP; pad_len(&hook, hook_addr, return_addr)?],
            None => Vec::new(),
        };

        let site_len = (hook.len() + pad.len()) as u32;
        let site = ByteRange::from_len(hook_addr, site_len)?;
        self.check_bounds(&site)?;
        self.check_bounds(&routine_range)?;
        // The site must be occupied code.
        if self.image.space().intersects(&site) {
            return Err(Error::AllocationConflict {
                start: site.start(),
                end: site.end(),
            });
        }

        let hook_end = hook_addr + hook.len() as u32;
        self.commit(&[
            Write {
                offset: hook_addr,
                bytes: &hook,
                kind: FsWriteType::NoMark,
            },
            Write {
                offset: hook_end,
                bytes: &pad,
                kind: FsWriteType::NoMark,
            },
            Write {
                offset: addr,
                bytes: &routine,
                kind: FsWriteType::MarkUsed,
            },
        ])?;

        info!(
            "patch: hook {hook_addr:#08X} -> {target} ({:#X} byte routine, {} NOP)",
            routine.len(),
            pad.len()
        );
        Ok(addr)
    }

    /// Places `routine` in free space and returns its file offset.
    ///
    /// The routine is meant to be entered with `JSL` and to end with `RTL`; use
    /// [`BinaryPatcher::jsl_to`] to build the call. With a `hint`, the lowest free
    /// placement at or after the hint is preferred.
    ///
    /// # Errors
    ///
    /// - [`Error::Assembly`] if `routine` cannot be assembled
    /// - [`Error::Empty`] if `routine` assembles to no bytes
    /// - [`Error::InsufficientSpace`] if no free range can hold the routine
    /// - [`Error::OutOfBounds`] if the chosen space lies outside the image
    /// - [`Error::SessionCorrupted`] if the write fails after validation
    pub fn add_jsl_routine(&mut self, routine: &[AsmItem], hint: Option<u32>) -> Result<u32> {
        let bytes = self.assemble_routine(routine)?;
        let addr = self
            .image
            .space()
            .get_free_addr(routine_len(&bytes), hint)?;
        self.check_bounds(&ByteRange::from_len(addr, routine_len(&bytes))?)?;

        self.commit(&[Write {
            offset: addr,
            bytes: &bytes,
            kind: FsWriteType::MarkUsed,
        }])?;

        info!("patch: routine of {:#X} bytes at {addr:#08X}", bytes.len());
        Ok(addr)
    }

    /// Applies a [`PatchRequest`], see [`BinaryPatcher::apply_jmp_patch`].
    ///
    /// # Errors
    /// Same as [`BinaryPatcher::apply_jmp_patch`].
    pub fn apply(&mut self, request: &PatchRequest) -> Result<u32> {
        self.apply_jmp_patch(&request.routine, request.hook_addr, request.return_addr)
    }

    /// Builds a `JSL` to the routine at file offset `addr`.
    ///
    /// # Errors
    /// Returns [`Error::OutOfRange`] if `addr` cannot be reached through the memory map.
    pub fn jsl_to(&self, addr: u32) -> Result<Instruction> {
        let target: BankedPtr = self.image.mapping().to_banked_pointer(addr)?;
        Instruction::long(Mnemonic::Jsl, target.to_u24())
    }

    fn assemble_routine(&self, items: &[AsmItem]) -> Result<Vec<u8>> {
        let bytes = self.assembler.assemble(items)?;
        if bytes.is_empty() {
            return Err(Error::Empty);
        }
        Ok(bytes)
    }

    fn check_bounds(&self, range: &ByteRange) -> Result<()> {
        if range.end() as usize > self.image.len() {
            return Err(Error::OutOfBounds);
        }
        Ok(())
    }

    fn commit(&mut self, writes: &[Write<'_>]) -> Result<()> {
        for write in writes {
            self.image
                .seek(write.offset)
                .and_then(|()| self.image.write(write.bytes, write.kind))
                .map_err(|e| {
                    Error::SessionCorrupted(format!("write at {:#08X} failed: {e}", write.offset))
                })?;
        }
        Ok(())
    }
}

/// Length of an assembled routine; oversized routines saturate and fail allocation.
fn routine_len(bytes: &[u8]) -> u32 {
    u32::try_from(bytes.len()).unwrap_or(u32::MAX)
}

fn pad_len(hook: &[u8], hook_addr: u32, return_addr: u32) -> Result<usize> {
    let too_small = || Error::PatchSiteTooSmall {
        hook_addr,
        return_addr,
        required: hook.len() as u32,
    };

    let gap = return_addr.checked_sub(hook_addr).ok_or_else(too_small)?;
    (gap as usize).checked_sub(hook.len()).ok_or_else(too_small)
}
