//! Chain configuration

use crate::RemoteGenesis;
use chrono::{DateTime, Utc};
use launchpad_cache::LaunchId;
use launchpad_genesis::GenesisTime;
use launchpad_peers::TUNNEL_BASE_PORT;
use launchpad_source::SourceReference;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Build record file name under the launch root
pub const BINARY_CACHE_FILE: &str = "binary-cache.json";

/// Account prefix genesis addresses are re-encoded to when none is configured
pub const DEFAULT_ADDRESS_PREFIX: &str = "cosmos";

/// A launch as reported by the coordination ledger
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainLaunch {
    /// Launch id
    pub id: LaunchId,
    /// Chain id of the launching chain
    pub chain_id: String,
    /// Source repository
    pub source_url: String,
    /// Commit the launch pins
    pub source_hash: String,
    /// Initial genesis to start from instead of the chain's default
    #[serde(default)]
    pub genesis_url: Option<String>,
    /// SHA-256 of the initial genesis
    #[serde(default)]
    pub genesis_hash: Option<String>,
    /// Scheduled launch time
    #[serde(default)]
    pub launch_time: Option<DateTime<Utc>>,
}

/// Everything needed to prepare one chain. Built once, then read-only.
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Chain id
    pub chain_id: String,
    /// Launch id, [`LaunchId::NONE`] outside a launch
    pub launch_id: LaunchId,
    /// Where the source comes from
    pub source: SourceReference,
    /// Chain home directory
    pub home: PathBuf,
    /// Build record file
    pub cache_path: PathBuf,
    /// Account prefix of the chain
    pub address_prefix: String,
    /// File that must exist exactly once in the source tree
    pub entrypoint: Option<String>,
    /// Initial genesis replacing the chain's default
    pub initial_genesis: Option<RemoteGenesis>,
    /// Genesis time to write
    pub genesis_time: GenesisTime,
    /// First local port for tunneled peers
    pub tunnel_base_port: u16,
}

impl ChainConfig {
    /// Configuration for a chain outside any launch
    pub fn new(chain_id: impl Into<String>, source: SourceReference, home: impl Into<PathBuf>) -> Self {
        let home = home.into();
        let cache_path = home.parent().unwrap_or(Path::new(".")).join(BINARY_CACHE_FILE);
        Self {
            chain_id: chain_id.into(),
            launch_id: LaunchId::NONE,
            source,
            home,
            cache_path,
            address_prefix: DEFAULT_ADDRESS_PREFIX.to_owned(),
            entrypoint: None,
            initial_genesis: None,
            genesis_time: GenesisTime::Now,
            tunnel_base_port: TUNNEL_BASE_PORT,
        }
    }

    /// Configuration for `launch`, with its home at `root/<launch id>` and
    /// the build records at `root/binary-cache.json`
    pub fn from_launch(launch: ChainLaunch, root: &Path) -> Self {
        let source = SourceReference::pinned(launch.source_url, launch.source_hash);
        let mut config = Self::new(launch.chain_id, source, root.join(launch.id.to_string()));
        config.launch_id = launch.id;
        config.cache_path = root.join(BINARY_CACHE_FILE);
        config.initial_genesis =
            launch.genesis_url.map(|url| RemoteGenesis { url, hash: launch.genesis_hash });
        config.genesis_time = GenesisTime::from(launch.launch_time);
        config
    }

    /// Set the account prefix
    pub fn with_address_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.address_prefix = prefix.into();
        self
    }

    /// Require `file_name` to exist exactly once in the source
    pub fn with_entrypoint(mut self, file_name: impl Into<String>) -> Self {
        self.entrypoint = Some(file_name.into());
        self
    }

    /// Set the first tunnel port
    pub const fn with_tunnel_base_port(mut self, port: u16) -> Self {
        self.tunnel_base_port = port;
        self
    }

    /// Set the genesis time
    pub const fn with_genesis_time(mut self, time: GenesisTime) -> Self {
        self.genesis_time = time;
        self
    }
}
