//! Bundle Core - Hardware-independent logic for the ESP32 bundle updater
//!
//! This crate contains the update protocol and the slot state machine so they
//! can be tested on the host platform without requiring ESP32 hardware. The
//! device binary plugs its flash, filesystem and HTTP adapters into the traits
//! exported here.

pub mod config;
pub mod entry;
pub mod error;
pub mod filesystem;
pub mod header;
pub mod orchestrator;
pub mod package;
pub mod path;
pub mod pull;
pub mod reader;
pub mod reconnect;
pub mod rollback;
pub mod slot;

pub use config::UpdaterConfig;
pub use entry::{EntryMeta, ENTRY_META_SIZE, MAX_FILE_SIZE, MAX_NAME_LEN};
pub use error::{BundleError, ErrorClass, MountError, SlotError};
pub use filesystem::DataFilesystem;
pub use header::{BundleHeader, HEADER_SIZE, MAGIC};
pub use orchestrator::{
    BundleReport, BundleUpdater, Phase, PhaseMarkers, StatusBoard, UpdateStatus, WrittenFile,
};
pub use package::{inspect, BundleBuilder, BundleSummary};
pub use pull::{PullReport, VersionProbe, VERSION_LEN};
pub use reconnect::{LinkEvent, ReconnectAction, ReconnectPolicy, ReconnectState};
pub use reader::{BundleReader, TransferBuffer, DEFAULT_BLOCK_SIZE};
pub use rollback::{confirm_running_slot, BootCheck, BootSlots, SlotState};
pub use slot::FirmwareSlot;
