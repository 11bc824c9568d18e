//! Launchpad Chain Runtime
//!
//! The preparation pipeline never touches a chain's state directly. Every
//! chain-specific step (building the daemon, initialising a home, adding
//! genesis accounts, collecting join transactions, validating) goes through
//! the [`ChainRuntime`] capability.
//!
//! [`CliRuntime`] drives a Cosmos-SDK style daemon binary as child
//! processes. With the `test-utils` feature, [`MemoryRuntime`] provides an
//! in-process fake that records every call.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod cli;
#[cfg(any(test, feature = "test-utils"))]
mod memory;

pub use cli::{CliRuntime, RuntimeConfig};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::{MemoryRuntime, RuntimeCall, RuntimeStep};

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// A chain's own tooling, as seen by the preparation pipeline.
///
/// Errors are opaque to callers and fatal to the step that produced them.
#[async_trait]
pub trait ChainRuntime: Send + Sync {
    /// Build the daemon from the source tree at `source`, returning the binary
    async fn build(&self, source: &Path) -> Result<PathBuf, RuntimeError>;

    /// Where the built binary lives
    fn binary(&self) -> PathBuf;

    /// Chain home directory
    fn home(&self) -> &Path;

    /// Genesis document
    fn genesis_path(&self) -> PathBuf {
        self.home().join("config").join("genesis.json")
    }

    /// Directory holding validator join transactions
    fn gentxs_path(&self) -> PathBuf {
        self.home().join("config").join("gentx")
    }

    /// Node configuration file
    fn config_path(&self) -> PathBuf {
        self.home().join("config").join("config.toml")
    }

    /// Record of tunneled peers for the relay client
    fn tunnels_path(&self) -> PathBuf {
        self.home().join("config").join("tunnels.toml")
    }

    /// Create a fresh validator key, default node config and default genesis
    async fn init_validator(&self) -> Result<(), RuntimeError>;

    /// Reset the genesis document to the chain's defaults, keeping the key
    async fn init_genesis(&self) -> Result<(), RuntimeError>;

    /// Add an account holding `coins` to genesis
    async fn add_genesis_account(&self, address: &str, coins: &str) -> Result<(), RuntimeError>;

    /// Add a delayed vesting account to genesis
    async fn add_vesting_account(
        &self,
        address: &str,
        total_balance: &str,
        vesting: &str,
        end_time: i64,
    ) -> Result<(), RuntimeError>;

    /// Fold the join transactions in [`gentxs_path`](Self::gentxs_path) into
    /// genesis
    async fn collect_gentxs(&self) -> Result<(), RuntimeError>;

    /// Check the genesis document
    async fn validate_genesis(&self) -> Result<(), RuntimeError>;

    /// Drop any local chain state so the node starts from genesis
    async fn unsafe_reset_state(&self) -> Result<(), RuntimeError>;

    /// Id of the local node
    async fn node_id(&self) -> Result<String, RuntimeError>;
}

/// Chain runtime errors
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// A command could not be started
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        /// Command line
        command: String,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// A command exited unsuccessfully
    #[error("`{command}` failed with exit code {code:?}: {stderr}")]
    Command {
        /// Command line
        command: String,
        /// Exit code, `None` when killed by a signal
        code: Option<i32>,
        /// Captured standard error
        stderr: String,
    },

    /// The daemon binary does not exist
    #[error("binary {} not found", .0.display())]
    MissingBinary(PathBuf),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
