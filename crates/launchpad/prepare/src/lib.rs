//! Launchpad Launch Preparation
//!
//! Turns a launch (pinned source + collected contributions) into a chain home
//! that is ready to start consensus.
//!
//! # Preparation states
//!
//! ```text
//! home missing: Uninitialized ─► Initializing ─┐
//!                                              ├─► GenesisBuilding ─► Validating ─► Ready
//! home present: HasHome ───────► Rebuilding ───┘
//!
//! Initializing: cached build, fresh validator key, default genesis
//! Rebuilding:   cached build, default genesis (key kept)
//! GenesisBuilding: contributions applied, peer config written
//! Validating:   validate-genesis, unsafe-reset-all
//! ```
//!
//! Peer descriptors are validated before the first transition. The entry
//! branch depends only on whether the chain home exists. Any failure stops
//! the machine; nothing is retried.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod build;
mod chain;
mod config;
mod event;
mod prepare;
mod remote_genesis;

pub use chain::Chain;
pub use config::{BINARY_CACHE_FILE, ChainConfig, ChainLaunch, DEFAULT_ADDRESS_PREFIX};
pub use event::{Event, EventBus, EventStatus};
pub use prepare::{PreparationState, Prepared};
pub use remote_genesis::RemoteGenesis;

pub use launchpad_cache::LaunchId;
pub use launchpad_genesis::{GenesisInformation, GenesisTime};

use launchpad_cache::{CacheError, ChecksumError};
use launchpad_genesis::GenesisError;
use launchpad_peers::PeerError;
use launchpad_runtime::RuntimeError;
use launchpad_source::SourceError;
use thiserror::Error;

/// Launch preparation errors
#[derive(Debug, Error)]
pub enum PrepareError {
    /// Fetching or checking the source failed
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// The build cache could not be read or written
    #[error("build cache error: {0}")]
    Cache(#[from] CacheError),

    /// The built binary could not be checksummed
    #[error("error computing the binary checksum: {0}")]
    Checksum(#[from] ChecksumError),

    /// A chain runtime step failed
    #[error("{context}: {source}")]
    Runtime {
        /// What was being done
        context: &'static str,
        /// Underlying error
        #[source]
        source: RuntimeError,
    },

    /// Genesis assembly failed
    #[error(transparent)]
    Genesis(#[from] GenesisError),

    /// Peer configuration failed
    #[error("peer configuration error: {0}")]
    Peers(#[from] PeerError),

    /// The remote initial genesis could not be downloaded
    #[error("cannot download initial genesis from {url}: {source}")]
    RemoteGenesis {
        /// Genesis url
        url: String,
        /// Underlying error
        #[source]
        source: reqwest::Error,
    },

    /// The remote initial genesis does not have the announced hash
    #[error("initial genesis from {url} has hash {actual}, expected {expected}")]
    GenesisHashMismatch {
        /// Genesis url
        url: String,
        /// Announced hash
        expected: String,
        /// Hash of the downloaded document
        actual: String,
    },

    /// The configuration and the runtime disagree on the chain home
    #[error("chain home {} does not match the runtime home {}", config.display(), runtime.display())]
    HomeMismatch {
        /// Home in the chain configuration
        config: std::path::PathBuf,
        /// Home the runtime operates on
        runtime: std::path::PathBuf,
    },

    /// Preparation observed cancellation
    #[error("preparation cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
