//! Configuration for a patch session.
//!
//! [`SessionConfig`] controls how an image is loaded, how the free-space manager places
//! routines and what happens when the image is written back out.

use crate::{address::Mapping, Result};

/// Configuration for loading, patching and saving an image.
///
/// # Examples
///
/// ```rust
/// use snespatch::{Mapping, SessionConfig};
///
/// let config = SessionConfig::strict()
///     .with_mapping(Mapping::HiRom)
///     .with_expected_md5("0123456789abcdef0123456789abcdef")?;
/// assert!(config.expected_md5.is_some());
/// # Ok::<(), snespatch::Error>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    /// Cartridge memory map used for banked pointers
    pub mapping: Mapping,

    /// Never place a routine across a bank boundary of `mapping`
    pub enforce_bank_boundaries: bool,

    /// Drop a 512-byte copier header found in front of the image
    pub strip_copier_header: bool,

    /// Refuse to load images whose MD5 digest differs from this one
    pub expected_md5: Option<[u8; 16]>,

    /// Recompute the internal header checksum when writing the image
    pub fix_checksum: bool,

    /// Refuse images without a header whose map mode agrees with `mapping`
    pub require_header: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            mapping: Mapping::HiRom,
            enforce_bank_boundaries: true,
            strip_copier_header: true,
            expected_md5: None,
            fix_checksum: true,
            require_header: false,
        }
    }
}

impl SessionConfig {
    /// Bare configuration: no header stripping, no bank policy, no checksum repair.
    ///
    /// Useful for tests and for images that are not complete cartridges.
    #[must_use]
    pub fn minimal() -> Self {
        Self {
            mapping: Mapping::HiRom,
            enforce_bank_boundaries: false,
            strip_copier_header: false,
            expected_md5: None,
            fix_checksum: false,
            require_header: false,
        }
    }

    /// [`SessionConfig::default`] plus a mandatory, matching header.
    ///
    /// A map mode mismatch is only logged by the default configuration; here it fails the
    /// load. Set an expected digest to pin the exact dump as well.
    #[must_use]
    pub fn strict() -> Self {
        Self {
            require_header: true,
            ..Self::default()
        }
    }

    /// Replaces the memory map.
    #[must_use]
    pub fn with_mapping(mut self, mapping: Mapping) -> Self {
        self.mapping = mapping;
        self
    }

    /// Sets the expected MD5 digest from its hexadecimal form.
    ///
    /// # Errors
    /// Returns [`Error::Malformed`] if `hex` is not 32 hexadecimal digits.
    pub fn with_expected_md5(mut self, hex: &str) -> Result<Self> {
        self.expected_md5 = Some(parse_md5(hex)?);
        Ok(self)
    }
}

fn parse_md5(hex: &str) -> Result<[u8; 16]> {
    let hex = hex.trim();
    if hex.len() != 32 || !hex.is_ascii() {
        return Err(malformed_error!("MD5 digest must be 32 hex digits, got '{}'", hex));
    }

    let mut digest = [0u8; 16];
    for (i, byte) in digest.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16)
            .map_err(|e| malformed_error!("invalid MD5 digest '{}': {}", hex, e))?;
    }
    Ok(digest)
}

/// Formats a digest as lowercase hex.
pub(crate) fn md5_to_hex(digest: &[u8]) -> String {
    digest.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn presets() {
        let default = SessionConfig::default();
        assert!(default.enforce_bank_boundaries);
        assert!(default.fix_checksum);
        assert!(!default.require_header);

        let strict = SessionConfig::strict();
        assert!(strict.require_header);
        assert_ne!(default, strict);
        assert_eq!(SessionConfig { require_header: false, ..strict }, default);

        let minimal = SessionConfig::minimal().with_mapping(Mapping::LoRom);
        assert!(!minimal.strip_copier_header);
        assert_eq!(minimal.mapping, Mapping::LoRom);
    }

    #[test]
    fn md5_parsing() -> Result<()> {
        let config =
            SessionConfig::minimal().with_expected_md5("00112233445566778899AABBCCDDEEFF")?;
        let digest = config.expected_md5.ok_or(Error::Empty)?;
        assert_eq!(digest[0], 0x00);
        assert_eq!(digest[15], 0xFF);
        assert_eq!(md5_to_hex(&digest), "00112233445566778899aabbccddeeff");

        assert!(SessionConfig::minimal().with_expected_md5("abc").is_err());
        assert!(SessionConfig::minimal()
            .with_expected_md5("zz112233445566778899aabbccddeeff")
            .is_err());
        Ok(())
    }
}
