//! Bundle upload state machine.
//!
//! A bundle is consumed strictly in order:
//! 1. Header
//! 2. Unmount the data filesystem
//! 3. Stream firmware into the inactive slot
//! 4. Commit the slot and make it the boot target
//! 5. Remount the data filesystem
//! 6. Stream file entries until the body is exhausted
//!
//! Restarting the device after a successful run is left to the caller, which
//! must answer the HTTP request first.

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use log::{debug, error, info, warn};
use serde::Serialize;

use crate::entry::{EntryMeta, ENTRY_META_SIZE, MAX_NAME_LEN};
use crate::error::BundleError;
use crate::filesystem::DataFilesystem;
use crate::header::{BundleHeader, HEADER_SIZE};
use crate::path::confine;
use crate::pull::{self, PullReport, VERSION_LEN};
use crate::reader::{BundleReader, TransferBuffer};
use crate::slot::FirmwareSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    AwaitHeader,
    UnmountFilesystem,
    WriteFirmware,
    FinalizeFirmware,
    RemountFilesystem,
    WriteFiles,
    Complete,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::AwaitHeader => "await_header",
            Phase::UnmountFilesystem => "unmount_filesystem",
            Phase::WriteFirmware => "write_firmware",
            Phase::FinalizeFirmware => "finalize_firmware",
            Phase::RemountFilesystem => "remount_filesystem",
            Phase::WriteFiles => "write_files",
            Phase::Complete => "complete",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseMarkers {
    pub header_parsed: bool,
    pub firmware_committed: bool,
    pub filesystem_remounted: bool,
}

/// Externally visible progress of the update context.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum UpdateStatus {
    #[default]
    Idle,
    Running {
        phase: Phase,
        processed: u64,
        total: u64,
    },
    Complete {
        firmware_bytes: u64,
        files: usize,
    },
    Failed {
        phase: Phase,
        message: String,
    },
}

/// Shared handle the status route reads while an update runs.
#[derive(Debug, Clone, Default)]
pub struct StatusBoard(Arc<Mutex<UpdateStatus>>);

impl StatusBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self) -> UpdateStatus {
        match self.0.lock() {
            Ok(status) => status.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn set(&self, status: UpdateStatus) {
        match self.0.lock() {
            Ok(mut current) => *current = status,
            Err(poisoned) => *poisoned.into_inner() = status,
        }
    }

    fn running(&self, phase: Phase, processed: u64, total: u64) {
        self.set(UpdateStatus::Running {
            phase,
            processed,
            total,
        });
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenFile {
    pub path: PathBuf,
    pub size: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleReport {
    pub header: BundleHeader,
    pub firmware_bytes: u64,
    pub files: Vec<WrittenFile>,
    /// Body bytes left unconsumed. Zero for every successful run.
    pub remaining: u64,
    pub markers: PhaseMarkers,
}

/// Per-request state.
struct UploadSession<R> {
    reader: BundleReader<R>,
    phase: Phase,
    markers: PhaseMarkers,
    total: u64,
}

impl<R: Read> UploadSession<R> {
    fn new(body: R, content_length: u64) -> Self {
        Self {
            reader: BundleReader::new(body, content_length),
            phase: Phase::AwaitHeader,
            markers: PhaseMarkers::default(),
            total: content_length,
        }
    }

    fn enter(&mut self, phase: Phase, status: &StatusBoard) {
        debug!("Bundle phase: {} -> {}", self.phase.as_str(), phase.as_str());
        self.phase = phase;
        status.running(phase, self.reader.consumed(), self.total);
    }
}

/// Process-wide update context: the slot writer, the data filesystem and the
/// one transfer buffer. Callers keep it behind a lock so a single upload owns
/// all three at a time.
pub struct BundleUpdater<S, F> {
    slot: S,
    fs: F,
    buffer: TransferBuffer,
    status: StatusBoard,
}

impl<S: FirmwareSlot, F: DataFilesystem> BundleUpdater<S, F> {
    pub fn new(slot: S, fs: F, buffer: TransferBuffer) -> Self {
        Self {
            slot,
            fs,
            buffer,
            status: StatusBoard::new(),
        }
    }

    pub fn with_status(mut self, status: StatusBoard) -> Self {
        self.status = status;
        self
    }

    pub fn status(&self) -> StatusBoard {
        self.status.clone()
    }

    pub fn slot(&self) -> &S {
        &self.slot
    }

    pub fn filesystem(&self) -> &F {
        &self.fs
    }

    pub fn filesystem_mut(&mut self) -> &mut F {
        &mut self.fs
    }

    /// Applies one bundle read from `body`.
    pub fn apply<R: Read>(
        &mut self,
        body: R,
        content_length: u64,
    ) -> Result<BundleReport, BundleError> {
        info!("Update package upload started. Size: {} bytes", content_length);

        let mut session = UploadSession::new(body, content_length);
        let result = self.run(&mut session);

        match &result {
            Ok(report) => {
                info!(
                    "Bundle applied: firmware {} bytes, {} file(s)",
                    report.firmware_bytes,
                    report.files.len()
                );
                self.status.set(UpdateStatus::Complete {
                    firmware_bytes: report.firmware_bytes,
                    files: report.files.len(),
                });
            }
            Err(e) => {
                error!("Bundle update failed during {}: {}", session.phase.as_str(), e);
                if session.phase == Phase::WriteFirmware || session.phase == Phase::FinalizeFirmware {
                    warn!("Data filesystem left unmounted");
                }
                self.status.set(UpdateStatus::Failed {
                    phase: session.phase,
                    message: e.to_string(),
                });
            }
        }

        result
    }

    /// Firmware-only update from a streaming source (URL fetch).
    pub fn pull<R: Read>(
        &mut self,
        source: R,
        expected_len: Option<u64>,
        running_version: &[u8; VERSION_LEN],
    ) -> Result<PullReport, BundleError> {
        self.status
            .running(Phase::WriteFirmware, 0, expected_len.unwrap_or(0));
        let result = pull::pull_update(
            source,
            expected_len,
            &mut self.slot,
            &mut self.buffer,
            running_version,
        );

        match &result {
            Ok(report) => self.status.set(UpdateStatus::Complete {
                firmware_bytes: report.bytes_written,
                files: 0,
            }),
            Err(e) => self.status.set(UpdateStatus::Failed {
                phase: Phase::WriteFirmware,
                message: e.to_string(),
            }),
        }
        result
    }

    fn run<R: Read>(&mut self, session: &mut UploadSession<R>) -> Result<BundleReport, BundleError> {
        session.enter(Phase::AwaitHeader, &self.status);
        let header = read_header(&mut session.reader)?;
        session.markers.header_parsed = true;
        info!(
            "Package contains: Firmware ({} bytes), filesystem ({} bytes)",
            header.firmware_size, header.filesystem_size
        );
        if header.declared_len() != session.total {
            warn!(
                "Header declares {} bytes but Content-Length is {}",
                header.declared_len(),
                session.total
            );
        }
        // Nothing has been touched yet; refuse a firmware size the body cannot hold.
        session.reader.ensure_available(header.firmware_size as u64)?;

        session.enter(Phase::UnmountFilesystem, &self.status);
        if self.fs.is_mounted() {
            info!("Unmounting data filesystem before firmware update...");
            self.fs.unmount().map_err(BundleError::Unmount)?;
        } else {
            debug!("Data filesystem already unmounted");
        }

        session.enter(Phase::WriteFirmware, &self.status);
        let firmware_bytes = write_firmware(
            &mut session.reader,
            &mut self.slot,
            &mut self.buffer,
            header.firmware_size,
            &self.status,
            session.total,
        )?;

        session.enter(Phase::FinalizeFirmware, &self.status);
        self.slot.finalize().map_err(BundleError::Finalize)?;
        session.markers.firmware_committed = true;
        info!("Firmware update complete!");

        session.enter(Phase::RemountFilesystem, &self.status);
        self.fs.mount().map_err(BundleError::Remount)?;
        session.markers.filesystem_remounted = true;
        info!("Data filesystem remounted successfully.");

        session.enter(Phase::WriteFiles, &self.status);
        let mut files = Vec::new();
        while session.reader.remaining() > 0 {
            let written = write_entry(&mut session.reader, &mut self.fs, &mut self.buffer)?;
            info!("Successfully wrote file: {} ({} bytes)", written.path.display(), written.size);
            files.push(written);
            self.status
                .running(Phase::WriteFiles, session.reader.consumed(), session.total);
        }

        session.enter(Phase::Complete, &self.status);
        Ok(BundleReport {
            header,
            firmware_bytes,
            files,
            remaining: session.reader.remaining(),
            markers: session.markers,
        })
    }
}

fn read_header<R: Read>(reader: &mut BundleReader<R>) -> Result<BundleHeader, BundleError> {
    let mut raw = [0u8; HEADER_SIZE];
    reader.read_exact(&mut raw)?;
    BundleHeader::parse(&raw)
}

fn write_firmware<R: Read, S: FirmwareSlot>(
    reader: &mut BundleReader<R>,
    slot: &mut S,
    buffer: &mut TransferBuffer,
    firmware_size: u32,
    status: &StatusBoard,
    total: u64,
) -> Result<u64, BundleError> {
    slot.begin(Some(firmware_size)).map_err(BundleError::Slot)?;

    let target = firmware_size as u64;
    let mut written: u64 = 0;
    let mut last_decile = 0;

    while written < target {
        let want = (target - written).min(buffer.capacity() as u64) as usize;
        let received = match reader.read_some(buffer.window(want)) {
            Ok(n) => n,
            Err(e) => {
                error!("Firmware upload failed after {} bytes", written);
                slot.abort();
                return Err(e);
            }
        };

        if let Err(e) = slot.write(buffer.filled(received)) {
            error!("Firmware write failed after {} bytes", written);
            slot.abort();
            return Err(BundleError::Slot(e));
        }

        written += received as u64;
        status.running(Phase::WriteFirmware, reader.consumed(), total);

        let decile = written * 10 / target;
        if decile > last_decile {
            last_decile = decile;
            info!("Writing firmware: {}% ({}/{} bytes)", decile * 10, written, target);
        }
    }

    Ok(written)
}

fn write_entry<R: Read, F: DataFilesystem>(
    reader: &mut BundleReader<R>,
    fs: &mut F,
    buffer: &mut TransferBuffer,
) -> Result<WrittenFile, BundleError> {
    let mut raw = [0u8; ENTRY_META_SIZE];
    reader.read_exact(&mut raw)?;
    let meta = EntryMeta::parse(&raw)?;
    debug!("File metadata: name length {}, size {}", meta.name_len, meta.size);
    reader.ensure_available(meta.body_len())?;

    let mut name = [0u8; MAX_NAME_LEN as usize];
    let name = &mut name[..meta.name_len as usize];
    reader.read_exact(name)?;
    let path = confine(fs.root(), name)?;

    info!("Writing file: {} (Size: {} bytes)", path.display(), meta.size);
    let mut file = fs.create(&path).map_err(|source| BundleError::File {
        path: path.clone(),
        source,
    })?;

    if let Err(e) = copy_content(reader, &mut file, buffer, meta.size, &path) {
        drop(file);
        if let Err(rm) = fs.remove(&path) {
            warn!("Failed to remove partial file {}: {}", path.display(), rm);
        }
        return Err(e);
    }

    Ok(WrittenFile {
        path,
        size: meta.size,
    })
}

fn copy_content<R: Read, W: Write>(
    reader: &mut BundleReader<R>,
    file: &mut W,
    buffer: &mut TransferBuffer,
    size: u32,
    path: &Path,
) -> Result<(), BundleError> {
    let file_error = |source| BundleError::File {
        path: path.to_path_buf(),
        source,
    };

    let mut left = size as u64;
    while left > 0 {
        let want = left.min(buffer.capacity() as u64) as usize;
        let received = reader.read_some(buffer.window(want))?;
        file.write_all(buffer.filled(received)).map_err(file_error)?;
        left -= received as u64;
    }
    file.flush().map_err(file_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{MountError, SlotError};
    use crate::package::BundleBuilder;
    use std::fs;
    use std::io::Cursor;

    #[derive(Default)]
    struct MemorySlot {
        data: Vec<u8>,
        open: bool,
        committed: bool,
    }

    impl FirmwareSlot for MemorySlot {
        fn begin(&mut self, _image_size: Option<u32>) -> Result<(), SlotError> {
            self.open = true;
            self.data.clear();
            Ok(())
        }

        fn write(&mut self, data: &[u8]) -> Result<(), SlotError> {
            self.data.extend_from_slice(data);
            Ok(())
        }

        fn finalize(&mut self) -> Result<(), SlotError> {
            self.open = false;
            self.committed = true;
            Ok(())
        }

        fn abort(&mut self) {
            self.open = false;
        }
    }

    struct DirFilesystem {
        root: PathBuf,
        mounted: bool,
    }

    impl DataFilesystem for DirFilesystem {
        type File = fs::File;

        fn root(&self) -> &Path {
            &self.root
        }

        fn is_mounted(&self) -> bool {
            self.mounted
        }

        fn unmount(&mut self) -> Result<(), MountError> {
            self.mounted = false;
            Ok(())
        }

        fn mount(&mut self) -> Result<(), MountError> {
            self.mounted = true;
            Ok(())
        }

        fn create(&mut self, path: &Path) -> std::io::Result<fs::File> {
            crate::filesystem::create_with_parents(path)
        }

        fn remove(&mut self, path: &Path) -> std::io::Result<()> {
            fs::remove_file(path)
        }
    }

    fn updater(root: &Path, block: usize) -> BundleUpdater<MemorySlot, DirFilesystem> {
        BundleUpdater::new(
            MemorySlot::default(),
            DirFilesystem {
                root: root.to_path_buf(),
                mounted: true,
            },
            TransferBuffer::try_new(block).unwrap(),
        )
    }

    #[test]
    fn test_apply_writes_firmware_and_files() {
        let dir = tempfile::tempdir().unwrap();
        let firmware: Vec<u8> = (0..20_000u32).map(|i| (i % 251) as u8).collect();
        let bundle = BundleBuilder::new(firmware.clone())
            .file("index.html", b"<h1>hi</h1>".to_vec())
            .file("css/site.css", b"body { color: red }".to_vec())
            .build()
            .unwrap();

        let mut updater = updater(dir.path(), 4096);
        let len = bundle.len() as u64;
        let report = updater.apply(Cursor::new(bundle), len).unwrap();

        assert_eq!(report.firmware_bytes, 20_000);
        assert_eq!(report.remaining, 0);
        assert_eq!(report.files.len(), 2);
        assert!(report.markers.firmware_committed && report.markers.filesystem_remounted);
        assert_eq!(updater.slot().data, firmware);
        assert!(updater.slot().committed);
        assert_eq!(fs::read(dir.path().join("index.html")).unwrap(), b"<h1>hi</h1>");
        assert_eq!(
            fs::read(dir.path().join("css/site.css")).unwrap(),
            b"body { color: red }"
        );
        assert!(matches!(updater.status().get(), UpdateStatus::Complete { files: 2, .. }));
    }

    #[test]
    fn test_trailing_bytes_too_short_for_entry() {
        let dir = tempfile::tempdir().unwrap();
        let mut bundle = BundleBuilder::new(vec![1, 2, 3]).build().unwrap();
        bundle.extend_from_slice(&[0x01, 0x00]);

        let mut updater = updater(dir.path(), 64);
        let len = bundle.len() as u64;
        let err = updater.apply(Cursor::new(bundle), len).unwrap_err();
        assert!(matches!(err, BundleError::Sequencing { needed: 6, remaining: 2 }));
        assert!(matches!(
            updater.status().get(),
            UpdateStatus::Failed { phase: Phase::WriteFiles, .. }
        ));
    }

    #[test]
    fn test_firmware_size_larger_than_body() {
        let dir = tempfile::tempdir().unwrap();
        let mut bundle = BundleBuilder::new(vec![0u8; 100]).build().unwrap();
        bundle.truncate(HEADER_SIZE + 50);

        let mut updater = updater(dir.path(), 64);
        let len = bundle.len() as u64;
        let err = updater.apply(Cursor::new(bundle), len).unwrap_err();
        assert!(matches!(err, BundleError::Sequencing { needed: 100, remaining: 50 }));
        // Rejected before the filesystem was touched.
        assert!(updater.filesystem().is_mounted());
        assert!(!updater.slot().open);
    }
}
