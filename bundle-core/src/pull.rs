//! Firmware-only update streamed from a URL.
//!
//! The image is written as it arrives. Once enough bytes are in to reach the
//! application descriptor, the embedded version string is compared with the
//! running one and an identical version aborts the slot.

use std::io::{self, Read};

use log::{debug, info, warn};

use crate::error::BundleError;
use crate::reader::TransferBuffer;
use crate::slot::FirmwareSlot;

/// `esp_image_header_t`
pub const IMAGE_HEADER_LEN: usize = 24;
/// `esp_image_segment_header_t`
pub const SEGMENT_HEADER_LEN: usize = 8;
/// `esp_app_desc_t`
pub const APP_DESC_LEN: usize = 256;
/// Offset of `version` inside the app descriptor.
pub const VERSION_OFFSET: usize = 16;
pub const VERSION_LEN: usize = 32;
/// Bytes needed before the running version can be compared.
pub const PROBE_LEN: usize = IMAGE_HEADER_LEN + SEGMENT_HEADER_LEN + APP_DESC_LEN;

const APP_DESC_MAGIC: u32 = 0xABCD_5432;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullReport {
    pub bytes_written: u64,
    pub version: String,
}

/// Accumulates the image head across chunks of any size.
#[derive(Debug, Default)]
pub struct VersionProbe {
    head: Vec<u8>,
    version: Option<[u8; VERSION_LEN]>,
}

impl VersionProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds the next chunk. Returns the version field exactly once, on the
    /// chunk that completes the probe window.
    pub fn feed(&mut self, chunk: &[u8]) -> Option<[u8; VERSION_LEN]> {
        if self.version.is_some() {
            return None;
        }

        let take = (PROBE_LEN - self.head.len()).min(chunk.len());
        self.head.extend_from_slice(&chunk[..take]);
        if self.head.len() < PROBE_LEN {
            return None;
        }

        let desc = IMAGE_HEADER_LEN + SEGMENT_HEADER_LEN;
        let magic = u32::from_le_bytes([
            self.head[desc],
            self.head[desc + 1],
            self.head[desc + 2],
            self.head[desc + 3],
        ]);
        if magic != APP_DESC_MAGIC {
            warn!("App descriptor magic mismatch: {:#010x}", magic);
        }

        let start = desc + VERSION_OFFSET;
        let mut version = [0u8; VERSION_LEN];
        version.copy_from_slice(&self.head[start..start + VERSION_LEN]);
        self.version = Some(version);
        self.head = Vec::new();
        Some(version)
    }

    pub fn version(&self) -> Option<&[u8; VERSION_LEN]> {
        self.version.as_ref()
    }
}

/// NUL-terminated version field as text.
pub fn version_str(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Copies `version` into a fixed descriptor field, truncating if needed.
pub fn version_field(version: &str) -> [u8; VERSION_LEN] {
    let mut field = [0u8; VERSION_LEN];
    let bytes = version.as_bytes();
    let len = bytes.len().min(VERSION_LEN - 1);
    field[..len].copy_from_slice(&bytes[..len]);
    field
}

pub fn pull_update<R: Read, S: FirmwareSlot>(
    mut source: R,
    expected_len: Option<u64>,
    slot: &mut S,
    buffer: &mut TransferBuffer,
    running_version: &[u8; VERSION_LEN],
) -> Result<PullReport, BundleError> {
    info!("Running firmware version: {}", version_str(running_version));
    slot.begin(None).map_err(BundleError::Slot)?;

    let mut probe = VersionProbe::new();
    let mut written: u64 = 0;

    loop {
        let capacity = buffer.capacity();
        let received = match read_chunk(&mut source, buffer.window(capacity)) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                slot.abort();
                return Err(BundleError::Read(e));
            }
        };

        if let Some(version) = probe.feed(buffer.filled(received)) {
            info!("New firmware version: {}", version_str(&version));
            if &version == running_version {
                warn!("Current running version is the same as the new one. Aborting update.");
                slot.abort();
                return Err(BundleError::AlreadyUpToDate {
                    version: version_str(&version),
                });
            }
        }

        if let Err(e) = slot.write(buffer.filled(received)) {
            slot.abort();
            return Err(BundleError::Slot(e));
        }
        written += received as u64;
        debug!("Image bytes written: {}", written);
    }

    let version = match probe.version() {
        Some(version) => version_str(version),
        None => {
            slot.abort();
            return Err(BundleError::TruncatedImage { received: written });
        }
    };

    if let Some(expected) = expected_len {
        if written != expected {
            slot.abort();
            return Err(BundleError::Incomplete {
                expected,
                received: written,
            });
        }
    }

    slot.finalize().map_err(BundleError::Finalize)?;
    info!("Total write binary data length: {}", written);

    Ok(PullReport {
        bytes_written: written,
        version,
    })
}

fn read_chunk<R: Read>(source: &mut R, dst: &mut [u8]) -> io::Result<usize> {
    loop {
        match source.read(dst) {
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            other => return other,
        }
    }
}
