use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

use crate::error::MountError;

/// The mounted data filesystem that bundled files land on.
pub trait DataFilesystem {
    type File: Write;

    /// Mount root every entry name is confined to.
    fn root(&self) -> &Path;

    fn is_mounted(&self) -> bool;

    fn unmount(&mut self) -> Result<(), MountError>;

    fn mount(&mut self) -> Result<(), MountError>;

    /// Creates (or truncates) `path`, making parent directories as needed.
    fn create(&mut self, path: &Path) -> io::Result<Self::File>;

    fn remove(&mut self, path: &Path) -> io::Result<()>;
}

/// `std::fs` file creation shared by the VFS-backed implementations.
pub fn create_with_parents(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    File::create(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_with_parents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("css").join("nested").join("styles.css");
        let mut file = create_with_parents(&path).unwrap();
        file.write_all(b"body{}").unwrap();
        drop(file);
        assert_eq!(fs::read(&path).unwrap(), b"body{}");
    }
}
