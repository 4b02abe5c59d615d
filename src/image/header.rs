//! Internal cartridge header and checksum repair.
//!
//! Every cartridge carries a 48-byte header at the end of its first bank window. After
//! injecting code the stored checksum no longer matches the image; emulators warn about
//! that and some flash carts refuse to boot, so the checksum is recomputed on save.
//!
//! # Layout
//!
//! Offsets are relative to the header base (`0xFFB0` for HiROM, `0x7FB0` for LoROM):
//!
//! | Offset | Size | Field                 |
//! |--------|------|-----------------------|
//! | `0x10` | 21   | Title (ASCII, padded) |
//! | `0x25` | 1    | Map mode              |
//! | `0x2C` | 2    | Checksum complement   |
//! | `0x2E` | 2    | Checksum              |

use crate::{address::Mapping, Error, Result};

/// Size of the header block starting at the header base.
pub const HEADER_SIZE: usize = 0x30;

const TITLE_OFFSET: usize = 0x10;
const TITLE_LEN: usize = 21;
const MAP_MODE_OFFSET: usize = 0x25;
const COMPLEMENT_OFFSET: usize = 0x2C;
const CHECKSUM_OFFSET: usize = 0x2E;

/// File offset of the header base for `mapping`.
#[must_use]
pub const fn header_base(mapping: Mapping) -> usize {
    match mapping {
        Mapping::HiRom => 0xFFB0,
        Mapping::LoRom => 0x7FB0,
    }
}

/// Read-only view of the internal header of an image.
#[derive(Debug, Clone, Copy)]
pub struct SnesHeader<'a> {
    raw: &'a [u8],
    mapping: Mapping,
}

impl<'a> SnesHeader<'a> {
    /// Locates the header of `data` for `mapping`.
    ///
    /// # Errors
    /// Returns [`Error::OutOfBounds`] if the image ends before the header does.
    pub fn parse(data: &'a [u8], mapping: Mapping) -> Result<Self> {
        let base = header_base(mapping);
        let raw = data.get(base..base + HEADER_SIZE).ok_or(Error::OutOfBounds)?;
        Ok(Self { raw, mapping })
    }

    /// The memory map this header was located with.
    #[must_use]
    pub fn mapping(&self) -> Mapping {
        self.mapping
    }

    /// Cartridge title with trailing padding removed.
    #[must_use]
    pub fn title(&self) -> String {
        let title = &self.raw[TITLE_OFFSET..TITLE_OFFSET + TITLE_LEN];
        String::from_utf8_lossy(title)
            .trim_end_matches([' ', '\0'])
            .to_string()
    }

    /// Raw map mode byte.
    #[must_use]
    pub fn map_mode(&self) -> u8 {
        self.raw[MAP_MODE_OFFSET]
    }

    /// Whether the map mode byte agrees with the mapping the header was parsed with.
    ///
    /// Bit 0 of the map mode selects HiROM.
    #[must_use]
    pub fn map_mode_matches(&self) -> bool {
        let hirom = self.map_mode() & 0x01 != 0;
        hirom == (self.mapping == Mapping::HiRom)
    }

    /// Stored checksum complement.
    #[must_use]
    pub fn complement(&self) -> u16 {
        read_u16(self.raw, COMPLEMENT_OFFSET)
    }

    /// Stored checksum.
    #[must_use]
    pub fn checksum(&self) -> u16 {
        read_u16(self.raw, CHECKSUM_OFFSET)
    }

    /// Whether checksum and complement add up to `0xFFFF`.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.checksum() ^ self.complement() == 0xFFFF
    }
}

fn read_u16(raw: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([raw[offset], raw[offset + 1]])
}

/// Computes the checksum `data` should carry.
///
/// The checksum fields are counted as `0xFFFF` (complement) and `0x0000` (checksum). An
/// image whose size is not a power of two is summed as if its trailing part were mirrored
/// up to the next power of two, which is how the cartridge appears on the bus.
///
/// # Errors
/// Returns [`Error::OutOfBounds`] if the image has no header for `mapping`.
pub fn compute_checksum(data: &[u8], mapping: Mapping) -> Result<u16> {
    SnesHeader::parse(data, mapping)?;

    let mut scratch = data.to_vec();
    clear_checksum_fields(&mut scratch, mapping);
    Ok(mirrored_sum(&scratch))
}

/// Recomputes the checksum of `data` and stores it together with its complement.
///
/// Returns the new checksum.
///
/// # Errors
/// Returns [`Error::OutOfBounds`] if the image has no header for `mapping`.
pub fn fix_checksum(data: &mut [u8], mapping: Mapping) -> Result<u16> {
    SnesHeader::parse(data, mapping)?;

    clear_checksum_fields(data, mapping);
    let checksum = mirrored_sum(data);

    let base = header_base(mapping);
    data[base + COMPLEMENT_OFFSET..base + COMPLEMENT_OFFSET + 2]
        .copy_from_slice(&(!checksum).to_le_bytes());
    data[base + CHECKSUM_OFFSET..base + CHECKSUM_OFFSET + 2]
        .copy_from_slice(&checksum.to_le_bytes());
    Ok(checksum)
}

fn clear_checksum_fields(data: &mut [u8], mapping: Mapping) {
    let base = header_base(mapping);
    data[base + COMPLEMENT_OFFSET..base + COMPLEMENT_OFFSET + 2].copy_from_slice(&[0xFF, 0xFF]);
    data[base + CHECKSUM_OFFSET..base + CHECKSUM_OFFSET + 2].copy_from_slice(&[0x00, 0x00]);
}

fn byte_sum(data: &[u8]) -> u64 {
    data.iter().map(|&b| u64::from(b)).sum()
}

fn mirrored_sum(data: &[u8]) -> u16 {
    if data.is_empty() || data.len().is_power_of_two() {
        return byte_sum(data) as u16;
    }

    let base_len = 1usize << (usize::BITS - 1 - data.len().leading_zeros());
    let (base, rest) = data.split_at(base_len);

    // The remainder is repeated until it fills another `base_len` bytes.
    let repeats = (base_len / rest.len()) as u64;
    let partial = base_len % rest.len();
    let total = byte_sum(base) + repeats * byte_sum(rest) + byte_sum(&rest[..partial]);
    total as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blank_image(len: usize, mapping: Mapping) -> Vec<u8> {
        let mut data = vec![0u8; len];
        let base = header_base(mapping);
        data[base + TITLE_OFFSET..base + TITLE_OFFSET + TITLE_LEN]
            .copy_from_slice(b"TEST CARTRIDGE       ");
        data[base + MAP_MODE_OFFSET] = match mapping {
            Mapping::HiRom => 0x31,
            Mapping::LoRom => 0x20,
        };
        data
    }

    #[test]
    fn parse_fields() -> Result<()> {
        let data = blank_image(0x10000, Mapping::HiRom);
        let header = SnesHeader::parse(&data, Mapping::HiRom)?;
        assert_eq!(header.title(), "TEST CARTRIDGE");
        assert_eq!(header.map_mode(), 0x31);
        assert!(header.map_mode_matches());
        assert!(!header.is_consistent());

        let lorom = SnesHeader::parse(&data, Mapping::LoRom)?;
        assert!(!lorom.map_mode_matches());
        Ok(())
    }

    #[test]
    fn header_outside_image() {
        let data = vec![0u8; 0x8000];
        assert!(matches!(
            SnesHeader::parse(&data, Mapping::HiRom),
            Err(Error::OutOfBounds)
        ));
        assert!(compute_checksum(&data, Mapping::HiRom).is_err());
    }

    #[test]
    fn checksum_of_blank_image() -> Result<()> {
        // Only the placeholder complement contributes: 0xFF + 0xFF.
        let data = vec![0u8; 0x8000];
        assert_eq!(compute_checksum(&data, Mapping::LoRom)?, 0x01FE);
        Ok(())
    }

    #[test]
    fn fix_makes_header_consistent() -> Result<()> {
        let mut data = blank_image(0x20000, Mapping::HiRom);
        data[0x1_2345] = 0x42;

        let expected = compute_checksum(&data, Mapping::HiRom)?;
        let written = fix_checksum(&mut data, Mapping::HiRom)?;
        assert_eq!(expected, written);

        let header = SnesHeader::parse(&data, Mapping::HiRom)?;
        assert!(header.is_consistent());
        assert_eq!(header.checksum(), written);

        // The stored fields do not influence the result.
        assert_eq!(compute_checksum(&data, Mapping::HiRom)?, written);
        Ok(())
    }

    #[test]
    fn remainder_is_mirrored() -> Result<()> {
        // 0x18000 bytes = 0x10000 base + 0x8000 remainder mirrored twice.
        let mut data = vec![0u8; 0x18000];
        data[0x10000] = 1;
        assert_eq!(compute_checksum(&data, Mapping::LoRom)?, 0x01FE + 2);
        Ok(())
    }
}
