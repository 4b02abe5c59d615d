//! 65816 instruction encoding with label resolution.
//!
//! [`InstructionEncoder`] turns validated [`Instruction`]s into machine code. Branches may
//! reference labels that are defined later in the same routine; their displacements are
//! recorded as fixups and patched in [`InstructionEncoder::finalize`].
//!
//! # Label Resolution
//!
//! ```rust
//! use snespatch::asm::{Instruction, InstructionEncoder, Mnemonic};
//!
//! let mut encoder = InstructionEncoder::new();
//!
//! encoder.define_label("loop")?;
//! encoder.emit(&Instruction::implied(Mnemonic::Dex)?)?;
//! encoder.emit(&Instruction::branch(Mnemonic::Bne, "loop")?)?;
//! encoder.emit(&Instruction::implied(Mnemonic::Rtl)?)?;
//!
//! let bytes = encoder.finalize()?;
//! assert_eq!(bytes, vec![0xCA, 0xD0, 0xFD, 0x6B]);
//! # Ok::<(), snespatch::Error>(())
//! ```
//!
//! # Errors
//!
//! Every failure is reported as [`crate::Error::Assembly`] naming the index of the
//! offending item (instructions, labels and raw byte blocks all count) and its text.

use std::collections::HashMap;

use crate::{
    asm::instruction::{AddressingMode, Instruction, Operand},
    Error, Result,
};

/// Pending displacement of a branch whose label was not yet resolved.
#[derive(Debug, Clone)]
pub struct LabelFixup {
    /// The target label name to resolve
    pub label: String,
    /// Position in the output where the displacement is written
    pub fixup_position: usize,
    /// Size of the displacement field (1 or 2 bytes)
    pub offset_size: u8,
    /// Position right after the branch, which displacements are relative to
    pub next_position: usize,
    /// Index of the branch in the item stream, for error reporting
    pub item_index: usize,
    /// Text of the branch, for error reporting
    pub instruction: String,
}

/// Core 65816 instruction encoder.
///
/// Instructions are validated at construction, so emitting one cannot fail; only label
/// handling can. The encoder is not [`Sync`]; build one per routine.
#[derive(Debug, Default)]
pub struct InstructionEncoder {
    /// Generated machine code
    bytecode: Vec<u8>,
    /// Defined labels (name -> byte position)
    labels: HashMap<String, usize>,
    /// Pending branch fixups awaiting label resolution
    fixups: Vec<LabelFixup>,
    /// Number of items consumed so far
    items: usize,
}

impl InstructionEncoder {
    /// Creates an empty encoder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Emits one instruction.
    ///
    /// # Errors
    /// Currently infallible; returns [`Result`] so label-related checks can surface here.
    pub fn emit(&mut self, instruction: &Instruction) -> Result<()> {
        let start = self.bytecode.len();
        self.bytecode.extend(instruction.encode_fixed());

        if let Operand::Label(label) = instruction.operand() {
            let offset_size = match instruction.mode() {
                AddressingMode::Relative16 => 2,
                _ => 1,
            };
            self.fixups.push(LabelFixup {
                label: label.clone(),
                fixup_position: start + 1,
                offset_size,
                next_position: self.bytecode.len(),
                item_index: self.items,
                instruction: instruction.to_string(),
            });
        }

        self.items += 1;
        Ok(())
    }

    /// Emits raw bytes (data tables embedded in a routine).
    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.bytecode.extend_from_slice(bytes);
        self.items += 1;
    }

    /// Defines `name` at the current position.
    ///
    /// # Errors
    /// Returns [`Error::Assembly`] if the label was already defined.
    pub fn define_label(&mut self, name: &str) -> Result<()> {
        if self.labels.contains_key(name) {
            return Err(Error::Assembly {
                index: self.items,
                instruction: format!("{name}:"),
                message: "duplicate label".to_string(),
            });
        }

        self.labels.insert(name.to_string(), self.bytecode.len());
        self.items += 1;
        Ok(())
    }

    /// Current output position in bytes.
    #[must_use]
    pub fn current_position(&self) -> usize {
        self.bytecode.len()
    }

    /// Position of a defined label.
    #[must_use]
    pub fn label_offset(&self, name: &str) -> Option<usize> {
        self.labels.get(name).copied()
    }

    /// Resolves all label fixups and returns the machine code.
    ///
    /// # Errors
    /// Returns [`Error::Assembly`] for undefined labels and displacements that do not fit
    /// the branch width.
    pub fn finalize(mut self) -> Result<Vec<u8>> {
        let fixups = std::mem::take(&mut self.fixups);
        for fixup in &fixups {
            let target = self.labels.get(&fixup.label).copied().ok_or_else(|| {
                Error::Assembly {
                    index: fixup.item_index,
                    instruction: fixup.instruction.clone(),
                    message: format!("undefined label '{}'", fixup.label),
                }
            })?;

            self.write_displacement(fixup, target)?;
        }

        Ok(self.bytecode)
    }

    fn write_displacement(&mut self, fixup: &LabelFixup, target: usize) -> Result<()> {
        let displacement = target as i64 - fixup.next_position as i64;
        let out_of_range = |limit: &str| Error::Assembly {
            index: fixup.item_index,
            instruction: fixup.instruction.clone(),
            message: format!(
                "label '{}' is {displacement} bytes away, beyond {limit} range",
                fixup.label
            ),
        };

        let pos = fixup.fixup_position;
        match fixup.offset_size {
            1 => {
                let value = i8::try_from(displacement).map_err(|_| out_of_range("8-bit"))?;
                self.bytecode[pos] = value.to_le_bytes()[0];
            }
            _ => {
                let value = i16::try_from(displacement).map_err(|_| out_of_range("16-bit"))?;
                self.bytecode[pos..pos + 2].copy_from_slice(&value.to_le_bytes());
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::{Mnemonic, StatusFlags};

    #[test]
    fn forward_branch() -> Result<()> {
        let mut encoder = InstructionEncoder::new();
        encoder.emit(&Instruction::branch(Mnemonic::Beq, "skip")?)?;
        encoder.emit(&Instruction::implied(Mnemonic::Inx)?)?;
        encoder.emit(&Instruction::implied(Mnemonic::Iny)?)?;
        encoder.define_label("skip")?;
        encoder.emit(&Instruction::implied(Mnemonic::Rtl)?)?;

        assert_eq!(encoder.label_offset("skip"), Some(4));
        assert_eq!(encoder.finalize()?, vec![0xF0, 0x02, 0xE8, 0xC8, 0x6B]);
        Ok(())
    }

    #[test]
    fn long_branch() -> Result<()> {
        let mut encoder = InstructionEncoder::new();
        encoder.emit(&Instruction::branch(Mnemonic::Brl, "far")?)?;
        encoder.emit_bytes(&[0u8; 0x200]);
        encoder.define_label("far")?;
        encoder.emit(&Instruction::rep(StatusFlags::MEMORY_8BIT)?)?;

        let bytes = encoder.finalize()?;
        assert_eq!(&bytes[..3], &[0x82, 0x00, 0x02]);
        assert_eq!(&bytes[0x203..], &[0xC2, 0x20]);
        Ok(())
    }

    #[test]
    fn short_branch_out_of_range() -> Result<()> {
        let mut encoder = InstructionEncoder::new();
        encoder.emit(&Instruction::branch(Mnemonic::Bra, "far")?)?;
        encoder.emit_bytes(&[0u8; 0x80]);
        encoder.define_label("far")?;

        match encoder.finalize() {
            Err(Error::Assembly {
                index, instruction, ..
            }) => {
                assert_eq!(index, 0);
                assert_eq!(instruction, "BRA far");
            }
            other => panic!("unexpected result {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn backward_branch_limit() -> Result<()> {
        let mut encoder = InstructionEncoder::new();
        encoder.define_label("top")?;
        encoder.emit_bytes(&[0u8; 126]);
        encoder.emit(&Instruction::branch(Mnemonic::Bra, "top")?)?;

        let bytes = encoder.finalize()?;
        assert_eq!(bytes[127], 0x80);
        Ok(())
    }

    #[test]
    fn undefined_and_duplicate_labels() -> Result<()> {
        let mut encoder = InstructionEncoder::new();
        encoder.emit(&Instruction::implied(Mnemonic::Nop)?)?;
        encoder.emit(&Instruction::branch(Mnemonic::Bcc, "nowhere")?)?;
        let err = encoder.finalize().unwrap_err();
        assert!(err.to_string().contains("item 1"));
        assert!(err.to_string().contains("nowhere"));

        let mut encoder = InstructionEncoder::new();
        encoder.define_label("a")?;
        assert!(matches!(
            encoder.define_label("a"),
            Err(Error::Assembly { index: 1, .. })
        ));
        Ok(())
    }
}
