//! # snespatch Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the snespatch library. Import this module to get quick access to everything a
//! patch session needs.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all snespatch operations
pub use crate::Error;

/// The result type used throughout snespatch
pub use crate::Result;

/// Loading and saving policy
pub use crate::SessionConfig;

// ================================================================================================
// Main Entry Points
// ================================================================================================

/// The image being patched
pub use crate::RomImage;

/// Code injection
pub use crate::{BinaryPatcher, PatchRequest};

// ================================================================================================
// Free Space and Addressing
// ================================================================================================

/// Free-space bookkeeping
pub use crate::{ByteRange, FreeSpaceManager, FsWriteType};

/// Memory maps and banked pointers
pub use crate::{BankedPtr, Mapping};

// ================================================================================================
// Assembler
// ================================================================================================

/// Instruction lists and the assembler seam
pub use crate::asm::{
    assemble, AddressingMode, AsmItem, AsmList, Assemble, Assembler, Instruction, Mnemonic,
    Operand, StatusFlags,
};
