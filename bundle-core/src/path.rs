use std::path::{Path, PathBuf};

use crate::error::BundleError;

/// Resolves an untrusted entry name to a path inside `root`.
///
/// Names are `/`-separated. Empty and `.` segments are dropped and `..` pops
/// the previous segment; anything that would climb above `root`, absolute
/// names, NUL bytes and non-UTF-8 names are rejected.
pub fn confine(root: &Path, name: &[u8]) -> Result<PathBuf, BundleError> {
    let unsafe_name = || BundleError::UnsafeName(String::from_utf8_lossy(name).into_owned());

    let name = std::str::from_utf8(name).map_err(|_| unsafe_name())?;
    if name.starts_with('/') || name.contains('\0') || name.contains('\\') {
        return Err(unsafe_name());
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in name.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                if segments.pop().is_none() {
                    return Err(unsafe_name());
                }
            }
            other => segments.push(other),
        }
    }

    if segments.is_empty() {
        return Err(unsafe_name());
    }

    let mut path = root.to_path_buf();
    path.extend(segments);
    Ok(path)
}
