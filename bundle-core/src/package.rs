//! Building and inspecting whole bundles in memory (host tooling).

use crate::entry::{decode_entry, encode_entry};
use crate::error::BundleError;
use crate::header::{BundleHeader, HEADER_SIZE};

/// Assembles a bundle: header, firmware image, then one entry per file.
#[derive(Debug, Clone, Default)]
pub struct BundleBuilder {
    firmware: Vec<u8>,
    files: Vec<(String, Vec<u8>)>,
}

impl BundleBuilder {
    pub fn new(firmware: Vec<u8>) -> Self {
        Self {
            firmware,
            files: Vec::new(),
        }
    }

    pub fn file(mut self, name: impl Into<String>, content: Vec<u8>) -> Self {
        self.add_file(name, content);
        self
    }

    pub fn add_file(&mut self, name: impl Into<String>, content: Vec<u8>) {
        self.files.push((name.into(), content));
    }

    pub fn build(&self) -> Result<Vec<u8>, BundleError> {
        let mut payload = Vec::new();
        for (name, content) in &self.files {
            payload.extend_from_slice(&encode_entry(name.as_bytes(), content)?);
        }

        let firmware_size =
            u32::try_from(self.firmware.len()).map_err(|_| BundleError::FileSize(u32::MAX))?;
        let filesystem_size =
            u32::try_from(payload.len()).map_err(|_| BundleError::FileSize(u32::MAX))?;
        let header = BundleHeader::for_payload(firmware_size, filesystem_size);

        let mut out = Vec::with_capacity(HEADER_SIZE + self.firmware.len() + payload.len());
        out.extend_from_slice(&header.encode());
        out.extend_from_slice(&self.firmware);
        out.extend_from_slice(&payload);
        Ok(out)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileSummary {
    pub name: String,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleSummary {
    pub header: BundleHeader,
    pub total_len: usize,
    pub files: Vec<FileSummary>,
}

impl BundleSummary {
    /// Whether the header sizes agree with the bytes actually present.
    pub fn is_consistent(&self) -> bool {
        self.header.declared_len() == self.total_len as u64
    }
}

/// Walks a bundle the way the device would, without writing anything.
pub fn inspect(bytes: &[u8]) -> Result<BundleSummary, BundleError> {
    if bytes.len() < HEADER_SIZE {
        return Err(BundleError::Sequencing {
            needed: HEADER_SIZE as u64,
            remaining: bytes.len() as u64,
        });
    }
    let mut raw = [0u8; HEADER_SIZE];
    raw.copy_from_slice(&bytes[..HEADER_SIZE]);
    let header = BundleHeader::parse(&raw)?;

    let body = &bytes[HEADER_SIZE..];
    let firmware_len = header.firmware_size as usize;
    if body.len() < firmware_len {
        return Err(BundleError::Sequencing {
            needed: firmware_len as u64,
            remaining: body.len() as u64,
        });
    }

    let mut rest = &body[firmware_len..];
    let mut files = Vec::new();
    while !rest.is_empty() {
        let (entry, tail) = decode_entry(rest)?;
        files.push(FileSummary {
            name: String::from_utf8_lossy(entry.name).into_owned(),
            size: entry.content.len() as u32,
        });
        rest = tail;
    }

    Ok(BundleSummary {
        header,
        total_len: bytes.len(),
        files,
    })
}
