//! Launchpad Build Cache
//!
//! Skips rebuilding a launch's binary when nothing it depends on changed.
//! A record is keyed by launch id and remembers the source commit the binary
//! was built from and the binary's SHA-256. A lookup hits only when both the
//! source commit and the binary currently on disk still match.
//!
//! Launch id zero means "no persisted launch": it always misses and is never
//! stored.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod checksum;
mod store;

pub use checksum::{BinaryChecksum, binary_checksum};
pub use store::{BuildCache, CacheLookup, CachedBinaryRecord};

use serde::{Deserialize, Serialize};
use std::{fmt, path::PathBuf};
use thiserror::Error;

/// Identifier of a launch on the coordination ledger
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct LaunchId(pub u64);

impl LaunchId {
    /// The "no persisted launch" id
    pub const NONE: Self = Self(0);

    /// Whether this is the "no persisted launch" id
    pub const fn is_none(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for LaunchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<u64> for LaunchId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

/// Binary checksum errors
#[derive(Debug, Error)]
pub enum ChecksumError {
    /// The binary does not exist
    #[error("binary {} not found", .0.display())]
    NotFound(PathBuf),

    /// Reading the binary failed
    #[error("cannot read binary {}: {source}", path.display())]
    Io {
        /// Binary path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },
}

/// Build cache errors
#[derive(Debug, Error)]
pub enum CacheError {
    /// Checksumming the binary failed for a reason other than absence
    #[error("binary checksum failed: {0}")]
    Checksum(#[from] ChecksumError),

    /// The record file is not valid JSON
    #[error("cache record {} is corrupted: {source}", path.display())]
    Corrupted {
        /// Record file path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: serde_json::Error,
    },

    /// Serialization error
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
