//! 65816 assembler used to render injected routines.
//!
//! The patcher never deals with machine code directly. It receives an ordered instruction
//! list ([`AsmList`]), hands it to an [`Assemble`] implementation and only looks at the
//! resulting bytes. [`Assembler`] is the built-in implementation; callers with their own
//! toolchain can implement [`Assemble`] and pass it to
//! [`crate::BinaryPatcher::with_assembler`].
//!
//! # Key Components
//!
//! - [`Instruction`] - Validated mnemonic/mode/operand triple
//! - [`AsmItem`] / [`AsmList`] - Instructions, labels and raw data in program order
//! - [`InstructionEncoder`] - Byte emission and label fixups
//! - [`Assemble`] / [`Assembler`] - The assembler seam used by the patcher
//!
//! # Examples
//!
//! ```rust
//! use snespatch::asm::{assemble, AsmItem, Instruction, Mnemonic};
//!
//! let routine: Vec<AsmItem> = vec![
//!     Instruction::implied(Mnemonic::Php)?.into(),
//!     Instruction::long(Mnemonic::Jsl, 0xC1_2345)?.into(),
//!     Instruction::implied(Mnemonic::Plp)?.into(),
//!     Instruction::implied(Mnemonic::Rtl)?.into(),
//! ];
//!
//! let bytes = assemble(&routine)?;
//! assert_eq!(bytes, vec![0x08, 0x22, 0x45, 0x23, 0xC1, 0x28, 0x6B]);
//! # Ok::<(), snespatch::Error>(())
//! ```

mod encoder;
mod instruction;
pub mod opcodes;

pub use encoder::{InstructionEncoder, LabelFixup};
pub use instruction::{AddressingMode, Instruction, Mnemonic, Operand, StatusFlags};

use crate::Result;

/// One element of an instruction list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AsmItem {
    /// A machine instruction
    Instruction(Instruction),
    /// A label definition at the current position
    Label(String),
    /// Raw bytes copied verbatim
    Bytes(Vec<u8>),
}

impl AsmItem {
    /// Creates a label definition.
    #[must_use]
    pub fn label(name: &str) -> Self {
        AsmItem::Label(name.to_string())
    }
}

impl From<Instruction> for AsmItem {
    fn from(instruction: Instruction) -> Self {
        AsmItem::Instruction(instruction)
    }
}

/// An ordered instruction list.
pub type AsmList = Vec<AsmItem>;

/// Something that can turn an instruction list into machine code.
///
/// Implementations must fail rather than truncate: a returned byte vector always encodes
/// the complete list.
pub trait Assemble {
    /// Assembles `items` into machine code.
    ///
    /// # Errors
    /// Returns [`crate::Error::Assembly`] if the list cannot be encoded.
    fn assemble(&self, items: &[AsmItem]) -> Result<Vec<u8>>;
}

/// The built-in 65816 assembler.
#[derive(Debug, Clone, Copy, Default)]
pub struct Assembler;

impl Assemble for Assembler {
    fn assemble(&self, items: &[AsmItem]) -> Result<Vec<u8>> {
        assemble(items)
    }
}

/// Assembles an instruction list with the built-in encoder.
///
/// # Errors
/// Returns [`crate::Error::Assembly`] for undefined or duplicate labels and branch targets
/// that are out of reach.
pub fn assemble(items: &[AsmItem]) -> Result<Vec<u8>> {
    let mut encoder = InstructionEncoder::new();
    for item in items {
        match item {
            AsmItem::Instruction(instruction) => encoder.emit(instruction)?,
            AsmItem::Label(name) => encoder.define_label(name)?,
            AsmItem::Bytes(bytes) => encoder.emit_bytes(bytes),
        }
    }
    encoder.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn assemble_with_labels_and_data() -> Result<()> {
        let items: AsmList = vec![
            Instruction::immediate16(Mnemonic::Ldx, 0x0003)?.into(),
            AsmItem::label("loop"),
            Instruction::new(
                Mnemonic::Lda,
                AddressingMode::AbsoluteLongX,
                Operand::Value(0xC2_0000),
            )?
            .into(),
            Instruction::implied(Mnemonic::Dex)?.into(),
            Instruction::branch(Mnemonic::Bpl, "loop")?.into(),
            Instruction::implied(Mnemonic::Rtl)?.into(),
            AsmItem::Bytes(vec![0xDE, 0xAD]),
        ];

        assert_eq!(
            Assembler.assemble(&items)?,
            vec![0xA2, 0x03, 0x00, 0xBF, 0x00, 0x00, 0xC2, 0xCA, 0x10, 0xF9, 0x6B, 0xDE, 0xAD]
        );
        Ok(())
    }

    #[test]
    fn assembly_error_names_item() -> Result<()> {
        let items: AsmList = vec![
            Instruction::implied(Mnemonic::Nop)?.into(),
            AsmItem::label("x"),
            AsmItem::label("x"),
        ];

        match assemble(&items) {
            Err(Error::Assembly { index, .. }) => assert_eq!(index, 2),
            other => panic!("unexpected result {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn empty_list_assembles_to_nothing() -> Result<()> {
        assert!(assemble(&[])?.is_empty());
        Ok(())
    }
}
