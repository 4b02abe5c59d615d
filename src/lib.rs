// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'image/mod.rs' uses mmap to map a ROM file into memory
// - 'image/output.rs' uses a mutable mmap for the output file

//! # snespatch
//!
//! Free-space allocation and 65816 code injection for SNES cartridge images.
//!
//! `snespatch` is the core of a ROM randomizer or hack toolchain: it tracks which byte
//! ranges of an image are unused, hands out addresses for newly assembled routines, and
//! installs those routines either behind a hook (a long jump written over existing code)
//! or as shared subroutines reached with `JSL`.
//!
//! ## Features
//!
//! - **Deterministic allocation** - First fit with an optional placement hint; identical
//!   inputs always produce byte-identical images
//! - **No double allocation** - Every byte handed out is marked used before the next request
//! - **Built-in 65816 assembler** - Complete opcode table, labels and branch fixups
//! - **Bank aware** - HiROM and LoROM address translation, routines never straddle a bank
//! - **Safe saving** - Memory-mapped output with header checksum repair
//!
//! ## Quick Start
//!
//! ```rust
//! use snespatch::prelude::*;
//!
//! let mut image = RomImage::new(vec![0u8; 0x4_0000], Mapping::HiRom)?;
//! image.seed_free_space([ByteRange::new(0x3_0000, 0x4_0000)?])?;
//!
//! let mut patcher = BinaryPatcher::new(&mut image);
//!
//! // A shared subroutine, reached from anywhere with JSL.
//! let helper = patcher.add_jsl_routine(
//!     &[
//!         Instruction::immediate8(Mnemonic::Sep, 0x20)?.into(),
//!         Instruction::implied(Mnemonic::Rtl)?.into(),
//!     ],
//!     None,
//! )?;
//!
//! // A hook at $C0:8000 that calls it and returns to $C0:8006.
//! let routine: Vec<AsmItem> = vec![
//!     patcher.jsl_to(helper)?.into(),
//!     Instruction::long(Mnemonic::Jml, 0xC0_8006)?.into(),
//! ];
//! let hooked = patcher.apply_jmp_patch(&routine, 0x8000, Some(0x8006))?;
//!
//! assert_eq!(helper, 0x3_0000);
//! assert_eq!(hooked, 0x3_0003);
//! # Ok::<(), snespatch::Error>(())
//! ```
//!
//! ## Architecture
//!
//! - [`freespace`] - The [`FreeSpaceManager`]: ordered, coalesced free ranges
//! - [`address`] - [`Mapping`] and [`BankedPtr`]: the only place that knows about banks
//! - [`asm`] - Instructions, the encoder and the [`asm::Assemble`] seam
//! - [`image`] - [`RomImage`]: bytes, cursor, free set, header and saving
//! - [`patcher`] - [`BinaryPatcher`]: the jump-patch and JSL-routine operations
//! - [`config`] - [`SessionConfig`]: loading and saving policy
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Every error is fatal for the
//! session that produced it:
//!
//! ```rust
//! use snespatch::{Error, FreeSpaceManager, ByteRange};
//!
//! let space = FreeSpaceManager::from_ranges([ByteRange::new(0x1010, 0x2000)?]);
//! match space.get_free_addr(0x2000, None) {
//!     Err(Error::InsufficientSpace { largest_block, .. }) => assert_eq!(largest_block, 0xFF0),
//!     other => panic!("unexpected result {other:?}"),
//! }
//! # Ok::<(), snespatch::Error>(())
//! ```
//!
//! ## Logging
//!
//! The crate logs through the [`log`](https://docs.rs/log) facade and never installs a
//! logger. Allocations are logged at `debug`, applied patches at `info`, raw image writes at
//! `trace`.
//!
//! ## Development and Testing
//!
//! ### Fuzzing
//!
//! ```bash
//! cargo +nightly fuzz run freespace --release
//! ```
//!
//! ### Testing
//!
//! ```bash
//! RUST_LOG=debug cargo test
//! cargo bench
//! ```

#[macro_use]
pub(crate) mod error;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust
/// use snespatch::prelude::*;
///
/// let image = RomImage::new(vec![0u8; 0x8000], Mapping::LoRom)?;
/// assert!(image.space().is_empty());
/// # Ok::<(), snespatch::Error>(())
/// ```
pub mod prelude;

pub mod address;
pub mod asm;
pub mod config;
pub mod freespace;
pub mod image;
pub mod patcher;

/// `snespatch` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `snespatch` Error type
///
/// Every variant is fatal for the patch session that produced it.
pub use error::Error;

/// Address translation between file offsets and CPU pointers.
pub use address::{BankedPtr, Mapping};

/// Session configuration.
pub use config::SessionConfig;

/// Free-space bookkeeping.
pub use freespace::{ByteRange, FreeSpaceManager, FsWriteType};

/// The image being patched.
pub use image::RomImage;

/// Code injection entry points.
pub use patcher::{BinaryPatcher, PatchRequest};
