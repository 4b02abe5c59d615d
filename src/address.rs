//! Translation between flat file offsets and banked 65816 pointers.
//!
//! The 65816 addresses memory through 24-bit pointers made of an 8-bit bank and a 16-bit
//! offset within that bank. How cartridge ROM is laid out in those banks depends on the
//! cartridge's memory map. This module is the only place in the crate that knows about
//! it; every other component works on flat file offsets and asks a [`Mapping`] for the
//! banked form only when writing a pointer into machine code.
//!
//! # Key Components
//!
//! - [`Mapping`] - The cartridge memory map (HiROM or LoROM)
//! - [`BankedPtr`] - A bank/offset pair as seen by the CPU
//!
//! # Supported Maps
//!
//! | Mapping | Bank window | First bank | File offset `x` maps to             |
//! |---------|-------------|------------|-------------------------------------|
//! | HiROM   | 64 KiB      | `$C0`      | `$C0 + x / $10000 : x % $10000`       |
//! | LoROM   | 32 KiB      | `$80`      | `$80 + x / $8000 : $8000 + x % $8000` |
//!
//! Both maps cover file offsets `[0, 0x400000)`. Mirrors of the same bytes in other banks
//! are rejected by [`Mapping::from_banked_pointer`], so the translation is a bijection.
//!
//! # Examples
//!
//! ```rust
//! use snespatch::{BankedPtr, Mapping};
//!
//! let ptr = Mapping::HiRom.to_banked_pointer(0x3F_1234)?;
//! assert_eq!(ptr, BankedPtr::new(0xFF, 0x1234));
//! assert_eq!(Mapping::HiRom.from_banked_pointer(ptr)?, 0x3F_1234);
//! # Ok::<(), snespatch::Error>(())
//! ```

use std::fmt;

use strum::{Display, EnumIter, EnumString};

use crate::{Error, Result};

/// A 24-bit CPU address split into bank and in-bank offset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BankedPtr {
    /// The bank byte (bits 16..24)
    pub bank: u8,
    /// The offset inside the bank (bits 0..16)
    pub addr: u16,
}

impl BankedPtr {
    /// Creates a pointer from its bank and in-bank offset.
    #[must_use]
    pub const fn new(bank: u8, addr: u16) -> Self {
        Self { bank, addr }
    }

    /// Splits a 24-bit value into bank and offset.
    ///
    /// # Errors
    /// Returns [`Error::OutOfRange`] if `value` does not fit in 24 bits.
    pub fn from_u24(value: u32) -> Result<Self> {
        if value > 0xFF_FFFF {
            return Err(Error::OutOfRange(value));
        }

        Ok(Self {
            bank: (value >> 16) as u8,
            addr: (value & 0xFFFF) as u16,
        })
    }

    /// Packs the pointer into a 24-bit value.
    #[must_use]
    pub const fn to_u24(self) -> u32 {
        ((self.bank as u32) << 16) | self.addr as u32
    }

    /// Returns the pointer in the little-endian byte order used by long operands.
    #[must_use]
    pub const fn to_le_bytes(self) -> [u8; 3] {
        let [lo, hi] = self.addr.to_le_bytes();
        [lo, hi, self.bank]
    }
}

impl fmt::Display for BankedPtr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${:02X}:{:04X}", self.bank, self.addr)
    }
}

/// Cartridge memory map used to translate file offsets.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, EnumIter,
)]
#[strum(ascii_case_insensitive)]
pub enum Mapping {
    /// 64 KiB banks starting at `$C0`
    #[default]
    #[strum(serialize = "hirom")]
    HiRom,
    /// 32 KiB windows at `$8000-$FFFF` of banks `$80` and up
    #[strum(serialize = "lorom")]
    LoRom,
}

impl Mapping {
    /// Number of file bytes covered by one bank.
    #[must_use]
    pub const fn bank_size(self) -> u32 {
        match self {
            Mapping::HiRom => 0x1_0000,
            Mapping::LoRom => 0x8000,
        }
    }

    /// The CPU bank holding file offset zero.
    #[must_use]
    pub const fn first_bank(self) -> u8 {
        match self {
            Mapping::HiRom => 0xC0,
            Mapping::LoRom => 0x80,
        }
    }

    /// Offset inside a bank at which the file window begins.
    #[must_use]
    pub const fn window_start(self) -> u16 {
        match self {
            Mapping::HiRom => 0x0000,
            Mapping::LoRom => 0x8000,
        }
    }

    /// Number of file bytes addressable through this map.
    #[must_use]
    pub const fn capacity(self) -> u32 {
        (0x100 - self.first_bank() as u32) * self.bank_size()
    }

    /// Returns the zero-based file bank that contains `file_offset`.
    #[must_use]
    pub const fn file_bank(self, file_offset: u32) -> u32 {
        file_offset / self.bank_size()
    }

    /// Converts a file offset to the pointer the CPU uses to reach it.
    ///
    /// # Errors
    /// Returns [`Error::OutOfRange`] if the offset lies beyond [`Mapping::capacity`].
    pub fn to_banked_pointer(self, file_offset: u32) -> Result<BankedPtr> {
        if file_offset >= self.capacity() {
            return Err(Error::OutOfRange(file_offset));
        }

        let bank = self.first_bank() as u32 + self.file_bank(file_offset);
        let addr = self.window_start() as u32 + file_offset % self.bank_size();

        Ok(BankedPtr::new(bank as u8, addr as u16))
    }

    /// Converts a CPU pointer back into a file offset.
    ///
    /// # Errors
    /// Returns [`Error::OutOfRange`] if the pointer is outside the ROM window of this map.
    pub fn from_banked_pointer(self, ptr: BankedPtr) -> Result<u32> {
        if ptr.bank < self.first_bank() || ptr.addr < self.window_start() {
            return Err(Error::OutOfRange(ptr.to_u24()));
        }

        let bank_index = u32::from(ptr.bank - self.first_bank());
        let in_bank = u32::from(ptr.addr - self.window_start());

        Ok(bank_index * self.bank_size() + in_bank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn hirom_translation() -> Result<()> {
        assert_eq!(Mapping::HiRom.to_banked_pointer(0)?, BankedPtr::new(0xC0, 0));
        assert_eq!(
            Mapping::HiRom.to_banked_pointer(0x02_8000)?,
            BankedPtr::new(0xC2, 0x8000)
        );
        assert_eq!(
            Mapping::HiRom.from_banked_pointer(BankedPtr::new(0xFF, 0xFFFF))?,
            0x3F_FFFF
        );
        Ok(())
    }

    #[test]
    fn lorom_translation() -> Result<()> {
        assert_eq!(
            Mapping::LoRom.to_banked_pointer(0)?,
            BankedPtr::new(0x80, 0x8000)
        );
        assert_eq!(
            Mapping::LoRom.to_banked_pointer(0x01_8123)?,
            BankedPtr::new(0x83, 0x8123)
        );
        assert_eq!(
            Mapping::LoRom.from_banked_pointer(BankedPtr::new(0x81, 0x8001))?,
            0x8001
        );
        Ok(())
    }

    #[test]
    fn out_of_range() {
        for mapping in Mapping::iter() {
            assert!(matches!(
                mapping.to_banked_pointer(mapping.capacity()),
                Err(Error::OutOfRange(_))
            ));
        }

        // Mirrors are rejected
        assert!(Mapping::HiRom
            .from_banked_pointer(BankedPtr::new(0x40, 0x1000))
            .is_err());
        assert!(Mapping::LoRom
            .from_banked_pointer(BankedPtr::new(0x80, 0x7FFF))
            .is_err());
    }

    #[test]
    fn round_trip_every_offset() -> Result<()> {
        for mapping in Mapping::iter() {
            for x in 0..mapping.capacity() {
                let ptr = mapping.to_banked_pointer(x)?;
                assert_eq!(ptr.bank as u32, mapping.first_bank() as u32 + mapping.file_bank(x));
                assert_eq!(mapping.from_banked_pointer(ptr)?, x, "{mapping} {x:#X}");
            }
        }
        Ok(())
    }

    #[test]
    fn file_banks() {
        assert_eq!(Mapping::HiRom.file_bank(0xFFFF), 0);
        assert_eq!(Mapping::HiRom.file_bank(0x1_0000), 1);
        assert_eq!(Mapping::LoRom.file_bank(0x7FFF), 0);
        assert_eq!(Mapping::LoRom.file_bank(0x8000), 1);
        assert_eq!(Mapping::LoRom.file_bank(0x3F_FFFF), 0x7F);
    }

    #[test]
    fn packing() -> Result<()> {
        let ptr = BankedPtr::from_u24(0xC2_1234)?;
        assert_eq!(ptr, BankedPtr::new(0xC2, 0x1234));
        assert_eq!(ptr.to_u24(), 0xC2_1234);
        assert_eq!(ptr.to_le_bytes(), [0x34, 0x12, 0xC2]);
        assert_eq!(ptr.to_string(), "$C2:1234");
        assert!(BankedPtr::from_u24(0x100_0000).is_err());
        Ok(())
    }

    #[test]
    fn mapping_from_str() {
        assert_eq!("HiROM".parse::<Mapping>().ok(), Some(Mapping::HiRom));
        assert_eq!("lorom".parse::<Mapping>().ok(), Some(Mapping::LoRom));
        assert!("exhirom".parse::<Mapping>().is_err());
    }
}
