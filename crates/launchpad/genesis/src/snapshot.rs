//! Byte-exact snapshots of files in the chain home.

use crate::GenesisError;
use launchpad_fs_util::write_atomic;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::warn;

/// The exact bytes of a file at one point in time
#[derive(Debug, Clone)]
pub struct GenesisSnapshot {
    path: PathBuf,
    contents: Option<Vec<u8>>,
}

impl GenesisSnapshot {
    /// Capture the document at `path`. A missing document is captured as
    /// absent.
    pub fn capture(path: &Path) -> Result<Self, GenesisError> {
        let contents = match std::fs::read(path) {
            Ok(contents) => Some(contents),
            Err(err) if err.kind() == ErrorKind::NotFound => None,
            Err(source) => return Err(GenesisError::Document { path: path.to_path_buf(), source }),
        };
        Ok(Self { path: path.to_path_buf(), contents })
    }

    /// Put the captured bytes back
    pub fn restore(&self) -> std::io::Result<()> {
        warn!(target: "launchpad::genesis", path = %self.path.display(), "Restoring snapshot");
        match &self.contents {
            Some(contents) => write_atomic(&self.path, contents),
            None => match std::fs::remove_file(&self.path) {
                Err(err) if err.kind() != ErrorKind::NotFound => Err(err),
                _ => Ok(()),
            },
        }
    }

    /// Captured bytes, `None` if the document did not exist
    pub fn contents(&self) -> Option<&[u8]> {
        self.contents.as_deref()
    }
}
