//! 65816 instruction representation.
//!
//! An [`Instruction`] is a mnemonic, an addressing mode and an operand. The combination is
//! validated when the instruction is built: the mnemonic must support the addressing mode
//! and the operand must fit the mode's width. A malformed instruction therefore never
//! reaches the encoder.
//!
//! # Key Components
//!
//! - [`Mnemonic`] - All 65816 mnemonics, including the `JML`/`JSL` long forms
//! - [`AddressingMode`] - All 65816 addressing modes, with immediates split by width
//! - [`Operand`] - Literal value, branch label or nothing
//! - [`StatusFlags`] - Processor status bits for `REP`/`SEP`
//!
//! # Examples
//!
//! ```rust
//! use snespatch::asm::{AddressingMode, Instruction, Mnemonic, Operand, StatusFlags};
//!
//! let load = Instruction::new(Mnemonic::Lda, AddressingMode::AbsoluteLong, Operand::Value(0x7E_0100))?;
//! assert_eq!(load.to_string(), "LDA $7E0100");
//! assert_eq!(load.encode_fixed(), vec![0xAF, 0x00, 0x01, 0x7E]);
//!
//! let wide = Instruction::rep(StatusFlags::MEMORY_8BIT | StatusFlags::INDEX_8BIT)?;
//! assert_eq!(wide.to_string(), "REP #$30");
//!
//! // STA has no immediate form
//! assert!(Instruction::immediate8(Mnemonic::Sta, 0x10).is_err());
//! # Ok::<(), snespatch::Error>(())
//! ```

use std::fmt;

use bitflags::bitflags;
use strum::{Display, EnumIter, EnumString, IntoStaticStr};

use crate::{asm::opcodes, Error, Result};

/// 65816 instruction mnemonics.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Display,
    EnumString,
    EnumIter,
    IntoStaticStr,
)]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
#[allow(missing_docs)]
pub enum Mnemonic {
    Adc,
    And,
    Asl,
    Bcc,
    Bcs,
    Beq,
    Bit,
    Bmi,
    Bne,
    Bpl,
    Bra,
    Brk,
    Brl,
    Bvc,
    Bvs,
    Clc,
    Cld,
    Cli,
    Clv,
    Cmp,
    Cop,
    Cpx,
    Cpy,
    Dec,
    Dex,
    Dey,
    Eor,
    Inc,
    Inx,
    Iny,
    Jml,
    Jmp,
    Jsl,
    Jsr,
    Lda,
    Ldx,
    Ldy,
    Lsr,
    Mvn,
    Mvp,
    Nop,
    Ora,
    Pea,
    Pei,
    Per,
    Pha,
    Phb,
    Phd,
    Phk,
    Php,
    Phx,
    Phy,
    Pla,
    Plb,
    Pld,
    Plp,
    Plx,
    Ply,
    Rep,
    Rol,
    Ror,
    Rti,
    Rtl,
    Rts,
    Sbc,
    Sec,
    Sed,
    Sei,
    Sep,
    Sta,
    Stp,
    Stx,
    Sty,
    Stz,
    Tax,
    Tay,
    Tcd,
    Tcs,
    Tdc,
    Trb,
    Tsb,
    Tsc,
    Tsx,
    Txa,
    Txs,
    Txy,
    Tya,
    Tyx,
    Wai,
    Wdm,
    Xba,
    Xce,
}

/// 65816 addressing modes.
///
/// The width of an immediate operand depends on the `M`/`X` processor flags at run time,
/// which an assembler cannot know. The two immediate widths are therefore separate modes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter)]
pub enum AddressingMode {
    /// No operand
    Implied,
    /// Operates on the accumulator (`ASL A`)
    Accumulator,
    /// 8-bit immediate (`#$12`)
    Immediate8,
    /// 16-bit immediate (`#$1234`)
    Immediate16,
    /// Direct page (`$12`)
    DirectPage,
    /// Direct page indexed by X (`$12,X`)
    DirectPageX,
    /// Direct page indexed by Y (`$12,Y`)
    DirectPageY,
    /// Direct page indirect (`($12)`)
    DirectPageIndirect,
    /// Direct page indexed indirect (`($12,X)`)
    DirectPageIndexedIndirect,
    /// Direct page indirect indexed (`($12),Y`)
    DirectPageIndirectIndexed,
    /// Direct page indirect long (`[$12]`)
    DirectPageIndirectLong,
    /// Direct page indirect long indexed (`[$12],Y`)
    DirectPageIndirectLongY,
    /// Absolute (`$1234`)
    Absolute,
    /// Absolute indexed by X (`$1234,X`)
    AbsoluteX,
    /// Absolute indexed by Y (`$1234,Y`)
    AbsoluteY,
    /// Absolute long (`$123456`)
    AbsoluteLong,
    /// Absolute long indexed by X (`$123456,X`)
    AbsoluteLongX,
    /// Absolute indirect (`($1234)`)
    AbsoluteIndirect,
    /// Absolute indexed indirect (`($1234,X)`)
    AbsoluteIndexedIndirect,
    /// Absolute indirect long (`[$1234]`)
    AbsoluteIndirectLong,
    /// Stack relative (`$12,S`)
    StackRelative,
    /// Stack relative indirect indexed (`($12,S),Y`)
    StackRelativeIndirectY,
    /// 8-bit PC relative (branches)
    Relative8,
    /// 16-bit PC relative (`BRL`, `PER`)
    Relative16,
    /// Block move source and destination banks (`MVN $7E,$7F`)
    BlockMove,
}

impl AddressingMode {
    /// Number of operand bytes following the opcode.
    #[must_use]
    pub const fn operand_size(self) -> u8 {
        match self {
            AddressingMode::Implied | AddressingMode::Accumulator => 0,
            AddressingMode::Immediate8
            | AddressingMode::DirectPage
            | AddressingMode::DirectPageX
            | AddressingMode::DirectPageY
            | AddressingMode::DirectPageIndirect
            | AddressingMode::DirectPageIndexedIndirect
            | AddressingMode::DirectPageIndirectIndexed
            | AddressingMode::DirectPageIndirectLong
            | AddressingMode::DirectPageIndirectLongY
            | AddressingMode::StackRelative
            | AddressingMode::StackRelativeIndirectY
            | AddressingMode::Relative8 => 1,
            AddressingMode::Immediate16
            | AddressingMode::Absolute
            | AddressingMode::AbsoluteX
            | AddressingMode::AbsoluteY
            | AddressingMode::AbsoluteIndirect
            | AddressingMode::AbsoluteIndexedIndirect
            | AddressingMode::AbsoluteIndirectLong
            | AddressingMode::Relative16
            | AddressingMode::BlockMove => 2,
            AddressingMode::AbsoluteLong | AddressingMode::AbsoluteLongX => 3,
        }
    }

    /// Returns `true` for the PC-relative modes, the only ones that accept labels.
    #[must_use]
    pub const fn is_relative(self) -> bool {
        matches!(self, AddressingMode::Relative8 | AddressingMode::Relative16)
    }
}

/// Instruction operand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    /// No operand (implied and accumulator modes)
    None,
    /// A literal value; for relative modes, the raw displacement
    Value(u32),
    /// A label defined elsewhere in the same instruction list (relative modes only)
    Label(String),
}

bitflags! {
    /// Processor status register bits, as used by `REP` and `SEP`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct StatusFlags: u8 {
        /// Carry
        const CARRY = 0x01;
        /// Zero
        const ZERO = 0x02;
        /// IRQ disable
        const IRQ_DISABLE = 0x04;
        /// Decimal mode
        const DECIMAL = 0x08;
        /// 8-bit index registers (`X`)
        const INDEX_8BIT = 0x10;
        /// 8-bit accumulator and memory (`M`)
        const MEMORY_8BIT = 0x20;
        /// Overflow
        const OVERFLOW = 0x40;
        /// Negative
        const NEGATIVE = 0x80;
    }
}

/// A validated 65816 instruction.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instruction {
    mnemonic: Mnemonic,
    mode: AddressingMode,
    operand: Operand,
    opcode: u8,
}

impl Instruction {
    /// Builds an instruction, validating mode and operand.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInstruction`] if
    /// - the mnemonic has no encoding for `mode`
    /// - an operand is given for an implied/accumulator mode, or missing for any other
    /// - a label is used outside a relative mode
    /// - a value does not fit the operand width of `mode`
    pub fn new(mnemonic: Mnemonic, mode: AddressingMode, operand: Operand) -> Result<Self> {
        let invalid = |message: String| Error::InvalidInstruction {
            mnemonic: mnemonic.to_string(),
            mode: mode.to_string(),
            message,
        };

        let opcode = opcodes::opcode(mnemonic, mode)
            .ok_or_else(|| invalid("addressing mode not supported".to_string()))?;

        let size = mode.operand_size();
        match &operand {
            Operand::None if size != 0 => {
                return Err(invalid("missing operand".to_string()));
            }
            Operand::Value(_) | Operand::Label(_) if size == 0 => {
                return Err(invalid("unexpected operand".to_string()));
            }
            Operand::Label(label) if !mode.is_relative() => {
                return Err(invalid(format!(
                    "label '{label}' requires a relative addressing mode"
                )));
            }
            Operand::Value(value) if u64::from(*value) >> (8 * u32::from(size)) != 0 => {
                return Err(invalid(format!(
                    "operand {value:#X} does not fit in {size} byte(s)"
                )));
            }
            _ => {}
        }

        Ok(Self {
            mnemonic,
            mode,
            operand,
            opcode,
        })
    }

    /// Builds an instruction without operand.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInstruction`] if `mnemonic` has no implied form.
    pub fn implied(mnemonic: Mnemonic) -> Result<Self> {
        Self::new(mnemonic, AddressingMode::Implied, Operand::None)
    }

    /// Builds an instruction with an 8-bit immediate.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInstruction`] if `mnemonic` has no immediate form.
    pub fn immediate8(mnemonic: Mnemonic, value: u8) -> Result<Self> {
        Self::new(
            mnemonic,
            AddressingMode::Immediate8,
            Operand::Value(u32::from(value)),
        )
    }

    /// Builds an instruction with a 16-bit immediate.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInstruction`] if `mnemonic` has no 16-bit immediate form.
    pub fn immediate16(mnemonic: Mnemonic, value: u16) -> Result<Self> {
        Self::new(
            mnemonic,
            AddressingMode::Immediate16,
            Operand::Value(u32::from(value)),
        )
    }

    /// Builds an instruction with a 16-bit absolute address.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInstruction`] if `mnemonic` has no absolute form.
    pub fn absolute(mnemonic: Mnemonic, addr: u16) -> Result<Self> {
        Self::new(
            mnemonic,
            AddressingMode::Absolute,
            Operand::Value(u32::from(addr)),
        )
    }

    /// Builds an instruction with a 24-bit long address.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInstruction`] if `mnemonic` has no long form or `addr`
    /// exceeds 24 bits.
    pub fn long(mnemonic: Mnemonic, addr: u32) -> Result<Self> {
        Self::new(mnemonic, AddressingMode::AbsoluteLong, Operand::Value(addr))
    }

    /// Builds a branch to `label`, using the branch width of `mnemonic`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInstruction`] if `mnemonic` is not a branch.
    pub fn branch(mnemonic: Mnemonic, label: &str) -> Result<Self> {
        let mode = match mnemonic {
            Mnemonic::Brl | Mnemonic::Per => AddressingMode::Relative16,
            _ => AddressingMode::Relative8,
        };
        Self::new(mnemonic, mode, Operand::Label(label.to_string()))
    }

    /// Builds a block move from bank `src` to bank `dst`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidInstruction`] unless `mnemonic` is `MVN` or `MVP`.
    pub fn block_move(mnemonic: Mnemonic, src: u8, dst: u8) -> Result<Self> {
        Self::new(
            mnemonic,
            AddressingMode::BlockMove,
            Operand::Value((u32::from(src) << 8) | u32::from(dst)),
        )
    }

    /// `REP #flags`: clears the given status bits.
    ///
    /// # Errors
    /// Never fails in practice; the signature matches the other constructors.
    pub fn rep(flags: StatusFlags) -> Result<Self> {
        Self::immediate8(Mnemonic::Rep, flags.bits())
    }

    /// `SEP #flags`: sets the given status bits.
    ///
    /// # Errors
    /// Never fails in practice; the signature matches the other constructors.
    pub fn sep(flags: StatusFlags) -> Result<Self> {
        Self::immediate8(Mnemonic::Sep, flags.bits())
    }

    /// The instruction mnemonic.
    #[must_use]
    pub fn mnemonic(&self) -> Mnemonic {
        self.mnemonic
    }

    /// The addressing mode.
    #[must_use]
    pub fn mode(&self) -> AddressingMode {
        self.mode
    }

    /// The operand.
    #[must_use]
    pub fn operand(&self) -> &Operand {
        &self.operand
    }

    /// The opcode byte.
    #[must_use]
    pub fn opcode(&self) -> u8 {
        self.opcode
    }

    /// Encoded length in bytes.
    #[must_use]
    pub fn size(&self) -> u32 {
        1 + u32::from(self.mode.operand_size())
    }

    /// Encodes an instruction whose operand is known; label operands encode as zero.
    ///
    /// Use [`crate::asm::InstructionEncoder`] to resolve labels.
    #[must_use]
    pub fn encode_fixed(&self) -> Vec<u8> {
        let value = match self.operand {
            Operand::Value(value) => value,
            Operand::None | Operand::Label(_) => 0,
        };

        let mut bytes = Vec::with_capacity(self.size() as usize);
        bytes.push(self.opcode);
        bytes.extend_from_slice(&value.to_le_bytes()[..usize::from(self.mode.operand_size())]);
        bytes
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.mnemonic)?;

        let value = match &self.operand {
            Operand::None => {
                if self.mode == AddressingMode::Accumulator {
                    write!(f, " A")?;
                }
                return Ok(());
            }
            Operand::Label(label) => return write!(f, " {label}"),
            Operand::Value(value) => *value,
        };

        match self.mode {
            AddressingMode::Implied | AddressingMode::Accumulator => Ok(()),
            AddressingMode::Immediate8 => write!(f, " #${value:02X}"),
            AddressingMode::Immediate16 => write!(f, " #${value:04X}"),
            AddressingMode::DirectPage | AddressingMode::Relative8 => write!(f, " ${value:02X}"),
            AddressingMode::DirectPageX => write!(f, " ${value:02X},X"),
            AddressingMode::DirectPageY => write!(f, " ${value:02X},Y"),
            AddressingMode::DirectPageIndirect => write!(f, " (${value:02X})"),
            AddressingMode::DirectPageIndexedIndirect => write!(f, " (${value:02X},X)"),
            AddressingMode::DirectPageIndirectIndexed => write!(f, " (${value:02X}),Y"),
            AddressingMode::DirectPageIndirectLong => write!(f, " [${value:02X}]"),
            AddressingMode::DirectPageIndirectLongY => write!(f, " [${value:02X}],Y"),
            AddressingMode::Absolute | AddressingMode::Relative16 => write!(f, " ${value:04X}"),
            AddressingMode::AbsoluteX => write!(f, " ${value:04X},X"),
            AddressingMode::AbsoluteY => write!(f, " ${value:04X},Y"),
            AddressingMode::AbsoluteLong => write!(f, " ${value:06X}"),
            AddressingMode::AbsoluteLongX => write!(f, " ${value:06X},X"),
            AddressingMode::AbsoluteIndirect => write!(f, " (${value:04X})"),
            AddressingMode::AbsoluteIndexedIndirect => write!(f, " (${value:04X},X)"),
            AddressingMode::AbsoluteIndirectLong => write!(f, " [${value:04X}]"),
            AddressingMode::StackRelative => write!(f, " ${value:02X},S"),
            AddressingMode::StackRelativeIndirectY => write!(f, " (${value:02X},S),Y"),
            AddressingMode::BlockMove => write!(f, " ${:02X},${:02X}", value >> 8, value & 0xFF),
        }
    }
}
