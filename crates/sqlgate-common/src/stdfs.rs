use std::fs::Metadata;
use std::path::Path;

use crate::{ErrorCode, GateResult, gate_err};

/// Wrapper around [`std::fs::read_to_string`] that returns a useful error in case of failure.
pub fn read_to_string<P: AsRef<Path>>(path: P) -> GateResult<String> {
    let path = path.as_ref();
    std::fs::read_to_string(path)
        .map_err(|e| gate_err!(ErrorCode::IoError, "Failed to read file: {}: {e}", path.display()))
}

/// Wrapper around [`std::fs::create_dir_all`] that returns a useful error in case of failure.
pub fn create_dir_all<P: AsRef<Path>>(path: P) -> GateResult<()> {
    let path = path.as_ref();
    std::fs::create_dir_all(path).map_err(|e| {
        gate_err!(
            ErrorCode::IoError,
            "Failed to create directory: {}: {e}",
            path.display()
        )
    })
}

/// Wrapper around [`std::fs::write`] that returns a useful error in case of failure.
pub fn write<P: AsRef<Path>, C: AsRef<[u8]>>(path: P, contents: C) -> GateResult<()> {
    let path = path.as_ref();
    std::fs::write(path, contents).map_err(|e| {
        gate_err!(ErrorCode::IoError, "Failed to write file: {}: {e}", path.display())
    })
}

/// Wrapper around [`std::fs::metadata`] that returns a useful error in case of failure.
pub fn metadata<P: AsRef<Path>>(path: P) -> GateResult<Metadata> {
    let path = path.as_ref();
    std::fs::metadata(path).map_err(|e| {
        gate_err!(
            ErrorCode::IoError,
            "Failed to get metadata for: {}: {e}",
            path.display()
        )
    })
}
