//! Fixed-size bundle header.
//!
//! ```text
//! offset 0:  10 bytes  magic "ESP_UPDATE"
//! offset 10: u32 LE    firmware_size
//! offset 14: u32 LE    filesystem_size
//! offset 18: u32 LE    firmware_offset
//! offset 22: u32 LE    filesystem_offset
//! ```

use crate::error::BundleError;

pub const MAGIC: &[u8; MAGIC_LEN] = b"ESP_UPDATE";
pub const MAGIC_LEN: usize = 10;
pub const HEADER_SIZE: usize = MAGIC_LEN + 4 * 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BundleHeader {
    pub firmware_size: u32,
    pub filesystem_size: u32,
    /// Advisory; the updater consumes the body strictly in order.
    pub firmware_offset: u32,
    /// Advisory; the updater consumes the body strictly in order.
    pub filesystem_offset: u32,
    /// Reserved. Not carried on the wire and never consulted.
    pub version: u32,
}

impl BundleHeader {
    /// Header for a bundle laid out sequentially: header, firmware, entries.
    pub fn for_payload(firmware_size: u32, filesystem_size: u32) -> Self {
        let firmware_offset = HEADER_SIZE as u32;
        Self {
            firmware_size,
            filesystem_size,
            firmware_offset,
            filesystem_offset: firmware_offset.saturating_add(firmware_size),
            version: 0,
        }
    }

    pub fn parse(bytes: &[u8; HEADER_SIZE]) -> Result<Self, BundleError> {
        if &bytes[..MAGIC_LEN] != MAGIC {
            return Err(BundleError::BadMagic);
        }

        Ok(Self {
            firmware_size: le_u32(bytes, MAGIC_LEN),
            filesystem_size: le_u32(bytes, MAGIC_LEN + 4),
            firmware_offset: le_u32(bytes, MAGIC_LEN + 8),
            filesystem_offset: le_u32(bytes, MAGIC_LEN + 12),
            version: 0,
        })
    }

    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[..MAGIC_LEN].copy_from_slice(MAGIC);
        out[10..14].copy_from_slice(&self.firmware_size.to_le_bytes());
        out[14..18].copy_from_slice(&self.filesystem_size.to_le_bytes());
        out[18..22].copy_from_slice(&self.firmware_offset.to_le_bytes());
        out[22..26].copy_from_slice(&self.filesystem_offset.to_le_bytes());
        out
    }

    /// Body length implied by the two size fields.
    pub fn declared_len(&self) -> u64 {
        HEADER_SIZE as u64 + self.firmware_size as u64 + self.filesystem_size as u64
    }
}

pub(crate) fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size() {
        assert_eq!(HEADER_SIZE, 26);
    }

    #[test]
    fn test_parse_known_bytes() {
        let mut raw = [0u8; HEADER_SIZE];
        raw[..10].copy_from_slice(b"ESP_UPDATE");
        raw[10..14].copy_from_slice(&[0x00, 0x10, 0x00, 0x00]); // 4096
        raw[14..18].copy_from_slice(&[0x20, 0x00, 0x00, 0x00]); // 32
        raw[18..22].copy_from_slice(&[26, 0, 0, 0]);
        raw[22..26].copy_from_slice(&[0x1a, 0x10, 0x00, 0x00]); // 4122

        let header = BundleHeader::parse(&raw).unwrap();
        assert_eq!(header.firmware_size, 4096);
        assert_eq!(header.filesystem_size, 32);
        assert_eq!(header.firmware_offset, 26);
        assert_eq!(header.filesystem_offset, 4122);
        assert_eq!(header.version, 0);
        assert_eq!(header, BundleHeader::for_payload(4096, 32));
    }

    #[test]
    fn test_bad_magic_rejected() {
        let mut raw = BundleHeader::for_payload(1, 1).encode();
        raw[9] = b'X';
        assert!(matches!(BundleHeader::parse(&raw), Err(BundleError::BadMagic)));

        let zeros = [0u8; HEADER_SIZE];
        assert!(matches!(BundleHeader::parse(&zeros), Err(BundleError::BadMagic)));
    }

    #[test]
    fn test_declared_len() {
        let header = BundleHeader::for_payload(100, 50);
        assert_eq!(header.declared_len(), 176);
    }
}
