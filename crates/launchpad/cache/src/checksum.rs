use crate::ChecksumError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::{
    fmt,
    fs::File,
    io::{ErrorKind, Read},
    path::Path,
};

/// Hex encoded SHA-256 of a binary
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BinaryChecksum(String);

impl BinaryChecksum {
    /// The hex digest
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BinaryChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// SHA-256 of the file at `path`.
///
/// A missing file is reported as [`ChecksumError::NotFound`] so callers can
/// treat it as a cache miss.
pub fn binary_checksum(path: &Path) -> Result<BinaryChecksum, ChecksumError> {
    let io_error = |source: std::io::Error| ChecksumError::Io { path: path.to_path_buf(), source };

    let mut file = File::open(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => ChecksumError::NotFound(path.to_path_buf()),
        _ => io_error(err),
    })?;

    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 8 * 1024];
    loop {
        let read = file.read(&mut buffer).map_err(io_error)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(BinaryChecksum(format!("{:x}", hasher.finalize())))
}
