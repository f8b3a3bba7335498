use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// Failure reported by a firmware slot writer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotError {
    NoUpdatePartition,
    BeginFailed(i32),
    WriteFailed(i32),
    NotStarted,
    ValidationFailed(i32),
    BootPartitionFailed(i32),
    StateUnavailable(i32),
    MarkValidFailed(i32),
}

impl fmt::Display for SlotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlotError::NoUpdatePartition => write!(f, "no update partition available"),
            SlotError::BeginFailed(code) => write!(f, "failed to begin slot write (0x{:x})", code),
            SlotError::WriteFailed(code) => write!(f, "slot write failed (0x{:x})", code),
            SlotError::NotStarted => write!(f, "no slot write in progress"),
            SlotError::ValidationFailed(code) => write!(f, "image validation failed (0x{:x})", code),
            SlotError::BootPartitionFailed(code) => {
                write!(f, "failed to set boot partition (0x{:x})", code)
            }
            SlotError::StateUnavailable(code) => {
                write!(f, "running slot state unavailable (0x{:x})", code)
            }
            SlotError::MarkValidFailed(code) => {
                write!(f, "failed to mark running slot valid (0x{:x})", code)
            }
        }
    }
}

impl StdError for SlotError {}

/// Failure reported by the data filesystem controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MountError {
    Unmount(i32),
    Mount(i32),
}

impl fmt::Display for MountError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MountError::Unmount(code) => write!(f, "failed to unmount filesystem (0x{:x})", code),
            MountError::Mount(code) => write!(f, "failed to mount filesystem (0x{:x})", code),
        }
    }
}

impl StdError for MountError {}

/// Coarse classification used to pick a response and decide what state the
/// device was left in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Malformed input detected before the phase's resource was touched.
    Format,
    /// Declared lengths disagree with the bytes left in the body.
    Sequencing,
    /// Transport, flash or file I/O failed mid-phase.
    Io,
    /// Firmware was committed (or commit failed) and the file phase was abandoned.
    State,
}

#[derive(Debug)]
pub enum BundleError {
    BadMagic,
    NameLength(u16),
    FileSize(u32),
    UnsafeName(String),
    TruncatedImage { received: u64 },
    AlreadyUpToDate { version: String },
    Sequencing { needed: u64, remaining: u64 },
    ShortRead { expected: usize, received: usize },
    Incomplete { expected: u64, received: u64 },
    Read(io::Error),
    Allocation(usize),
    Unmount(MountError),
    Slot(SlotError),
    File { path: PathBuf, source: io::Error },
    Finalize(SlotError),
    Remount(MountError),
}

impl BundleError {
    pub fn class(&self) -> ErrorClass {
        match self {
            BundleError::BadMagic
            | BundleError::NameLength(_)
            | BundleError::FileSize(_)
            | BundleError::UnsafeName(_)
            | BundleError::TruncatedImage { .. }
            | BundleError::AlreadyUpToDate { .. } => ErrorClass::Format,
            BundleError::Sequencing { .. } => ErrorClass::Sequencing,
            BundleError::ShortRead { .. }
            | BundleError::Incomplete { .. }
            | BundleError::Read(_)
            | BundleError::Allocation(_)
            | BundleError::Unmount(_)
            | BundleError::Slot(_)
            | BundleError::File { .. } => ErrorClass::Io,
            BundleError::Finalize(_) | BundleError::Remount(_) => ErrorClass::State,
        }
    }

    /// HTTP status the upload route answers with.
    pub fn status_code(&self) -> u16 {
        match self.class() {
            ErrorClass::Format | ErrorClass::Sequencing => 400,
            ErrorClass::Io | ErrorClass::State => 500,
        }
    }
}

impl fmt::Display for BundleError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BundleError::BadMagic => write!(f, "Invalid package format"),
            BundleError::NameLength(len) => write!(f, "Invalid file name length: {}", len),
            BundleError::FileSize(size) => write!(f, "Invalid file size: {}", size),
            BundleError::UnsafeName(name) => write!(f, "File name escapes mount root: {:?}", name),
            BundleError::TruncatedImage { received } => {
                write!(f, "Image ended after {} bytes, before its app descriptor", received)
            }
            BundleError::AlreadyUpToDate { version } => {
                write!(f, "Running version {} is the same as the new image", version)
            }
            BundleError::Sequencing { needed, remaining } => write!(
                f,
                "Declared size needs {} bytes but only {} remain in the body",
                needed, remaining
            ),
            BundleError::ShortRead { expected, received } => {
                write!(f, "Body ended early: expected {} bytes, got {}", expected, received)
            }
            BundleError::Incomplete { expected, received } => {
                write!(f, "Incomplete image: expected {} bytes, got {}", expected, received)
            }
            BundleError::Read(e) => write!(f, "Failed to read request body: {}", e),
            BundleError::Allocation(size) => {
                write!(f, "Failed to allocate {} byte write buffer", size)
            }
            BundleError::Unmount(e) => write!(f, "{}", e),
            BundleError::Slot(e) => write!(f, "Firmware write failed: {}", e),
            BundleError::File { path, source } => {
                write!(f, "Failed to write {}: {}", path.display(), source)
            }
            BundleError::Finalize(e) => write!(f, "Failed to complete firmware update: {}", e),
            BundleError::Remount(e) => {
                write!(f, "Firmware committed but filesystem remount failed: {}", e)
            }
        }
    }
}

impl StdError for BundleError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            BundleError::Read(e) => Some(e),
            BundleError::File { source, .. } => Some(source),
            BundleError::Unmount(e) | BundleError::Remount(e) => Some(e),
            BundleError::Slot(e) | BundleError::Finalize(e) => Some(e),
            _ => None,
        }
    }
}
