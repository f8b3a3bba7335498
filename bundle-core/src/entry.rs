//! File entry records that follow the firmware payload.
//!
//! ```text
//! u16 LE  name_len   (1..=255)
//! u32 LE  size       (1..=1 MiB)
//! name_len bytes     path suffix under the mount root
//! size bytes         file content
//! ```

use crate::error::BundleError;
use crate::header::le_u32;

pub const ENTRY_META_SIZE: usize = 6;
pub const MAX_NAME_LEN: u16 = 255;
pub const MAX_FILE_SIZE: u32 = 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryMeta {
    pub name_len: u16,
    pub size: u32,
}

impl EntryMeta {
    pub fn new(name_len: u16, size: u32) -> Result<Self, BundleError> {
        if name_len < 1 || name_len > MAX_NAME_LEN {
            return Err(BundleError::NameLength(name_len));
        }
        if size < 1 || size > MAX_FILE_SIZE {
            return Err(BundleError::FileSize(size));
        }
        Ok(Self { name_len, size })
    }

    pub fn parse(bytes: &[u8; ENTRY_META_SIZE]) -> Result<Self, BundleError> {
        let name_len = u16::from_le_bytes([bytes[0], bytes[1]]);
        let size = le_u32(bytes, 2);
        Self::new(name_len, size)
    }

    pub fn encode(&self) -> [u8; ENTRY_META_SIZE] {
        let mut out = [0u8; ENTRY_META_SIZE];
        out[..2].copy_from_slice(&self.name_len.to_le_bytes());
        out[2..].copy_from_slice(&self.size.to_le_bytes());
        out
    }

    /// Bytes that follow the metadata: name plus content.
    pub fn body_len(&self) -> u64 {
        self.name_len as u64 + self.size as u64
    }
}

/// Serializes one entry. Fails on the same bounds the device enforces.
pub fn encode_entry(name: &[u8], content: &[u8]) -> Result<Vec<u8>, BundleError> {
    let name_len = u16::try_from(name.len()).map_err(|_| BundleError::NameLength(u16::MAX))?;
    let size = u32::try_from(content.len()).map_err(|_| BundleError::FileSize(u32::MAX))?;
    let meta = EntryMeta::new(name_len, size)?;

    let mut out = Vec::with_capacity(ENTRY_META_SIZE + name.len() + content.len());
    out.extend_from_slice(&meta.encode());
    out.extend_from_slice(name);
    out.extend_from_slice(content);
    Ok(out)
}

/// An entry borrowed from an in-memory filesystem payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRef<'a> {
    pub name: &'a [u8],
    pub content: &'a [u8],
}

/// Decodes the first entry of `bytes`, returning it and the unconsumed tail.
pub fn decode_entry(bytes: &[u8]) -> Result<(EntryRef<'_>, &[u8]), BundleError> {
    if bytes.len() < ENTRY_META_SIZE {
        return Err(BundleError::Sequencing {
            needed: ENTRY_META_SIZE as u64,
            remaining: bytes.len() as u64,
        });
    }
    let mut raw = [0u8; ENTRY_META_SIZE];
    raw.copy_from_slice(&bytes[..ENTRY_META_SIZE]);
    let meta = EntryMeta::parse(&raw)?;

    let rest = &bytes[ENTRY_META_SIZE..];
    if (rest.len() as u64) < meta.body_len() {
        return Err(BundleError::Sequencing {
            needed: meta.body_len(),
            remaining: rest.len() as u64,
        });
    }
    let (name, rest) = rest.split_at(meta.name_len as usize);
    let (content, rest) = rest.split_at(meta.size as usize);
    Ok((EntryRef { name, content }, rest))
}

#[cfg(test)]
mod tests {
    use super::*;
    use quickcheck::quickcheck;

    #[test]
    fn test_round_trip_five_byte_name() {
        let encoded = encode_entry(b"a.css", b"0123456789").unwrap();
        assert_eq!(encoded.len(), ENTRY_META_SIZE + 5 + 10);
        assert_eq!(&encoded[..6], &[5, 0, 10, 0, 0, 0]);

        let (entry, rest) = decode_entry(&encoded).unwrap();
        assert_eq!(entry.name, b"a.css");
        assert_eq!(entry.content, b"0123456789");
        assert!(rest.is_empty());
    }

    #[test]
    fn test_name_len_bounds() {
        assert!(matches!(EntryMeta::new(0, 1), Err(BundleError::NameLength(0))));
        assert!(matches!(EntryMeta::new(256, 1), Err(BundleError::NameLength(256))));
        assert!(EntryMeta::new(1, 1).is_ok());
        assert!(EntryMeta::new(255, 1).is_ok());
    }

    #[test]
    fn test_size_bounds() {
        assert!(matches!(EntryMeta::new(4, 0), Err(BundleError::FileSize(0))));
        assert!(matches!(
            EntryMeta::new(4, 1_048_577),
            Err(BundleError::FileSize(1_048_577))
        ));
        assert!(EntryMeta::new(4, 1_048_576).is_ok());
    }

    #[test]
    fn test_parse_reads_little_endian() {
        let meta = EntryMeta::parse(&[0x0a, 0x00, 0x00, 0x00, 0x01, 0x00]).unwrap();
        assert_eq!(meta.name_len, 10);
        assert_eq!(meta.size, 65536);
    }

    #[test]
    fn test_decode_short_tail() {
        let encoded = encode_entry(b"index.html", b"<html></html>").unwrap();
        let cut = &encoded[..encoded.len() - 1];
        assert!(matches!(decode_entry(cut), Err(BundleError::Sequencing { .. })));
        assert!(matches!(decode_entry(&encoded[..3]), Err(BundleError::Sequencing { .. })));
    }

    quickcheck! {
        fn prop_in_range_meta_accepted(name_len: u16, size: u32) -> bool {
            let name_len = name_len % MAX_NAME_LEN + 1;
            let size = size % MAX_FILE_SIZE + 1;
            EntryMeta::parse(&EntryMeta { name_len, size }.encode()).ok()
                == Some(EntryMeta { name_len, size })
        }

        fn prop_oversized_file_rejected(extra: u32) -> bool {
            let size = MAX_FILE_SIZE.saturating_add(extra.max(1));
            EntryMeta::new(1, size).is_err()
        }
    }
}
