//! 65816 opcode table.
//!
//! Maps a mnemonic/addressing mode pair to its opcode byte. The eight accumulator
//! instructions and the four shift/rotate instructions follow regular column layouts and
//! are computed from a base opcode; everything else is listed explicitly.

use crate::asm::instruction::{AddressingMode, Mnemonic};

/// `NOP`, used to pad hook sites.
pub const NOP: u8 = 0xEA;
/// `JML long`, the redirect written at hook sites.
pub const JML_LONG: u8 = 0x5C;
/// `JSL long`
pub const JSL_LONG: u8 = 0x22;
/// `RTL`
pub const RTL: u8 = 0x6B;

/// Returns the opcode of `mnemonic` in `mode`, or `None` if the combination does not exist.
#[must_use]
pub fn opcode(mnemonic: Mnemonic, mode: AddressingMode) -> Option<u8> {
    use AddressingMode as AM;
    use Mnemonic as M;

    if let Some(base) = accumulator_base(mnemonic) {
        let offset = match mode {
            AM::DirectPageIndexedIndirect => 0x01,
            AM::StackRelative => 0x03,
            AM::DirectPage => 0x05,
            AM::DirectPageIndirectLong => 0x07,
            AM::Immediate8 | AM::Immediate16 if mnemonic != M::Sta => 0x09,
            AM::Absolute => 0x0D,
            AM::AbsoluteLong => 0x0F,
            AM::DirectPageIndirectIndexed => 0x11,
            AM::DirectPageIndirect => 0x12,
            AM::StackRelativeIndirectY => 0x13,
            AM::DirectPageX => 0x15,
            AM::DirectPageIndirectLongY => 0x17,
            AM::AbsoluteY => 0x19,
            AM::AbsoluteX => 0x1D,
            AM::AbsoluteLongX => 0x1F,
            _ => return None,
        };
        return Some(base + offset);
    }

    if let Some(base) = shift_base(mnemonic) {
        let offset = match mode {
            AM::DirectPage => 0x06,
            AM::Accumulator => 0x0A,
            AM::Absolute => 0x0E,
            AM::DirectPageX => 0x16,
            AM::AbsoluteX => 0x1E,
            _ => return None,
        };
        return Some(base + offset);
    }

    let opcode = match (mnemonic, mode) {
        // Implied
        (M::Php, AM::Implied) => 0x08,
        (M::Clc, AM::Implied) => 0x18,
        (M::Plp, AM::Implied) => 0x28,
        (M::Sec, AM::Implied) => 0x38,
        (M::Rti, AM::Implied) => 0x40,
        (M::Pha, AM::Implied) => 0x48,
        (M::Cli, AM::Implied) => 0x58,
        (M::Rts, AM::Implied) => 0x60,
        (M::Pla, AM::Implied) => 0x68,
        (M::Sei, AM::Implied) => 0x78,
        (M::Dey, AM::Implied) => 0x88,
        (M::Tya, AM::Implied) => 0x98,
        (M::Tay, AM::Implied) => 0xA8,
        (M::Clv, AM::Implied) => 0xB8,
        (M::Iny, AM::Implied) => 0xC8,
        (M::Cld, AM::Implied) => 0xD8,
        (M::Inx, AM::Implied) => 0xE8,
        (M::Sed, AM::Implied) => 0xF8,
        (M::Phd, AM::Implied) => 0x0B,
        (M::Tcs, AM::Implied) => 0x1B,
        (M::Pld, AM::Implied) => 0x2B,
        (M::Tsc, AM::Implied) => 0x3B,
        (M::Phk, AM::Implied) => 0x4B,
        (M::Tcd, AM::Implied) => 0x5B,
        (M::Rtl, AM::Implied) => RTL,
        (M::Tdc, AM::Implied) => 0x7B,
        (M::Phb, AM::Implied) => 0x8B,
        (M::Txy, AM::Implied) => 0x9B,
        (M::Plb, AM::Implied) => 0xAB,
        (M::Tyx, AM::Implied) => 0xBB,
        (M::Wai, AM::Implied) => 0xCB,
        (M::Stp, AM::Implied) => 0xDB,
        (M::Xba, AM::Implied) => 0xEB,
        (M::Xce, AM::Implied) => 0xFB,
        (M::Txa, AM::Implied) => 0x8A,
        (M::Txs, AM::Implied) => 0x9A,
        (M::Tax, AM::Implied) => 0xAA,
        (M::Tsx, AM::Implied) => 0xBA,
        (M::Dex, AM::Implied) => 0xCA,
        (M::Nop, AM::Implied) => NOP,
        (M::Phy, AM::Implied) => 0x5A,
        (M::Ply, AM::Implied) => 0x7A,
        (M::Phx, AM::Implied) => 0xDA,
        (M::Plx, AM::Implied) => 0xFA,

        // Signature and status immediates are always 8-bit
        (M::Brk, AM::Immediate8) => 0x00,
        (M::Cop, AM::Immediate8) => 0x02,
        (M::Wdm, AM::Immediate8) => 0x42,
        (M::Rep, AM::Immediate8) => 0xC2,
        (M::Sep, AM::Immediate8) => 0xE2,

        // Branches
        (M::Bpl, AM::Relative8) => 0x10,
        (M::Bmi, AM::Relative8) => 0x30,
        (M::Bvc, AM::Relative8) => 0x50,
        (M::Bvs, AM::Relative8) => 0x70,
        (M::Bra, AM::Relative8) => 0x80,
        (M::Bcc, AM::Relative8) => 0x90,
        (M::Bcs, AM::Relative8) => 0xB0,
        (M::Bne, AM::Relative8) => 0xD0,
        (M::Beq, AM::Relative8) => 0xF0,
        (M::Brl, AM::Relative16) => 0x82,
        (M::Per, AM::Relative16) => 0x62,

        // Increment / decrement
        (M::Inc, AM::Accumulator) => 0x1A,
        (M::Inc, AM::DirectPage) => 0xE6,
        (M::Inc, AM::Absolute) => 0xEE,
        (M::Inc, AM::DirectPageX) => 0xF6,
        (M::Inc, AM::AbsoluteX) => 0xFE,
        (M::Dec, AM::Accumulator) => 0x3A,
        (M::Dec, AM::DirectPage) => 0xC6,
        (M::Dec, AM::Absolute) => 0xCE,
        (M::Dec, AM::DirectPageX) => 0xD6,
        (M::Dec, AM::AbsoluteX) => 0xDE,

        // Bit operations
        (M::Tsb, AM::DirectPage) => 0x04,
        (M::Tsb, AM::Absolute) => 0x0C,
        (M::Trb, AM::DirectPage) => 0x14,
        (M::Trb, AM::Absolute) => 0x1C,
        (M::Bit, AM::DirectPage) => 0x24,
        (M::Bit, AM::Absolute) => 0x2C,
        (M::Bit, AM::DirectPageX) => 0x34,
        (M::Bit, AM::AbsoluteX) => 0x3C,
        (M::Bit, AM::Immediate8 | AM::Immediate16) => 0x89,

        // Stores
        (M::Stz, AM::DirectPage) => 0x64,
        (M::Stz, AM::DirectPageX) => 0x74,
        (M::Stz, AM::Absolute) => 0x9C,
        (M::Stz, AM::AbsoluteX) => 0x9E,
        (M::Stx, AM::DirectPage) => 0x86,
        (M::Stx, AM::Absolute) => 0x8E,
        (M::Stx, AM::DirectPageY) => 0x96,
        (M::Sty, AM::DirectPage) => 0x84,
        (M::Sty, AM::Absolute) => 0x8C,
        (M::Sty, AM::DirectPageX) => 0x94,

        // Index register loads and compares
        (M::Ldx, AM::Immediate8 | AM::Immediate16) => 0xA2,
        (M::Ldx, AM::DirectPage) => 0xA6,
        (M::Ldx, AM::Absolute) => 0xAE,
        (M::Ldx, AM::DirectPageY) => 0xB6,
        (M::Ldx, AM::AbsoluteY) => 0xBE,
        (M::Ldy, AM::Immediate8 | AM::Immediate16) => 0xA0,
        (M::Ldy, AM::DirectPage) => 0xA4,
        (M::Ldy, AM::Absolute) => 0xAC,
        (M::Ldy, AM::DirectPageX) => 0xB4,
        (M::Ldy, AM::AbsoluteX) => 0xBC,
        (M::Cpx, AM::Immediate8 | AM::Immediate16) => 0xE0,
        (M::Cpx, AM::DirectPage) => 0xE4,
        (M::Cpx, AM::Absolute) => 0xEC,
        (M::Cpy, AM::Immediate8 | AM::Immediate16) => 0xC0,
        (M::Cpy, AM::DirectPage) => 0xC4,
        (M::Cpy, AM::Absolute) => 0xCC,

        // Jumps and calls
        (M::Jmp, AM::Absolute) => 0x4C,
        (M::Jmp | M::Jml, AM::AbsoluteLong) => JML_LONG,
        (M::Jmp, AM::AbsoluteIndirect) => 0x6C,
        (M::Jmp, AM::AbsoluteIndexedIndirect) => 0x7C,
        (M::Jmp | M::Jml, AM::AbsoluteIndirectLong) => 0xDC,
        (M::Jsr, AM::Absolute) => 0x20,
        (M::Jsr, AM::AbsoluteIndexedIndirect) => 0xFC,
        (M::Jsl, AM::AbsoluteLong) => JSL_LONG,

        // Stack pushes of effective addresses
        (M::Pea, AM::Absolute) => 0xF4,
        (M::Pei, AM::DirectPageIndirect) => 0xD4,

        // Block moves
        (M::Mvp, AM::BlockMove) => 0x44,
        (M::Mvn, AM::BlockMove) => 0x54,

        _ => return None,
    };

    Some(opcode)
}

fn accumulator_base(mnemonic: Mnemonic) -> Option<u8> {
    match mnemonic {
        Mnemonic::Ora => Some(0x00),
        Mnemonic::And => Some(0x20),
        Mnemonic::Eor => Some(0x40),
        Mnemonic::Adc => Some(0x60),
        Mnemonic::Sta => Some(0x80),
        Mnemonic::Lda => Some(0xA0),
        Mnemonic::Cmp => Some(0xC0),
        Mnemonic::Sbc => Some(0xE0),
        _ => None,
    }
}

fn shift_base(mnemonic: Mnemonic) -> Option<u8> {
    match mnemonic {
        Mnemonic::Asl => Some(0x00),
        Mnemonic::Rol => Some(0x20),
        Mnemonic::Lsr => Some(0x40),
        Mnemonic::Ror => Some(0x60),
        _ => None,
    }
}
