//! Launch file parser
//!
//! ```toml
//! [launch]
//! id = 7
//! chain_id = "orbit-1"
//! source_url = "https://github.com/orbit/orbit"
//! source_hash = "4b825dc642cb6eb9a060e54bf8d69288fbee4904"
//! launch_time = "2026-11-01T12:00:00Z"
//!
//! [runtime]
//! binary_name = "orbitd"
//!
//! [[genesis.accounts]]
//! address = "spn1..."
//! coins = "1000stake"
//!
//! [[genesis.validators]]
//! gentx_file = "gentxs/v1.json"
//! peer = { id = "V1", connection = { type = "tcp_address", address = "1.2.3.4:26656" } }
//! ```

use chrono::{DateTime, Utc};
use eyre::{WrapErr, bail};
use launchpad_genesis::{GenesisAccount, GenesisInformation, GenesisValidator, VestingAccount};
use launchpad_peers::PeerDescriptor;
use launchpad_prepare::{ChainConfig, ChainLaunch, LaunchId};
use launchpad_runtime::RuntimeConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Directory under the user's home holding chain homes and build records
pub const DEFAULT_ROOT_DIR: &str = "spn";

/// Binaries directory under the root
const BIN_DIR: &str = "bin";

/// `~/spn`, or `./spn` without a home directory
pub fn default_root() -> PathBuf {
    dirs_next::home_dir().unwrap_or_else(|| PathBuf::from(".")).join(DEFAULT_ROOT_DIR)
}

/// A parsed launch file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LaunchFile {
    launch: LaunchSection,
    runtime: RuntimeSection,
    #[serde(default)]
    genesis: GenesisSection,
    /// Directory relative gentx files are resolved against
    #[serde(skip)]
    base_dir: PathBuf,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct LaunchSection {
    id: u64,
    chain_id: String,
    source_url: String,
    source_hash: String,
    genesis_url: Option<String>,
    genesis_hash: Option<String>,
    launch_time: Option<DateTime<Utc>>,
    address_prefix: Option<String>,
    entrypoint: Option<String>,
    tunnel_base_port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuntimeSection {
    binary_name: String,
    bin_dir: Option<PathBuf>,
    build_command: Option<Vec<String>>,
    moniker: Option<String>,
    keyring_backend: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct GenesisSection {
    #[serde(default)]
    accounts: Vec<GenesisAccount>,
    #[serde(default)]
    vesting_accounts: Vec<VestingAccount>,
    #[serde(default)]
    validators: Vec<ValidatorEntry>,
}

/// A validator with its gentx given inline or as a file
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
struct ValidatorEntry {
    gentx: Option<String>,
    gentx_file: Option<PathBuf>,
    peer: PeerDescriptor,
}

/// Read and parse the launch file at `path`
pub fn parse_launch_file(path: &Path) -> eyre::Result<LaunchFile> {
    let contents = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read launch file {}", path.display()))?;
    let mut file: LaunchFile = toml::from_str(&contents)
        .wrap_err_with(|| format!("invalid launch file {}", path.display()))?;
    file.base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();

    if file.launch.chain_id.is_empty() {
        bail!("launch file {} has an empty chain id", path.display());
    }
    Ok(file)
}

impl LaunchFile {
    /// Launch id
    pub const fn launch_id(&self) -> LaunchId {
        LaunchId(self.launch.id)
    }

    /// Chain id
    pub fn chain_id(&self) -> &str {
        &self.launch.chain_id
    }

    /// The launch as the coordination ledger reports it
    pub fn launch(&self) -> ChainLaunch {
        ChainLaunch {
            id: self.launch_id(),
            chain_id: self.launch.chain_id.clone(),
            source_url: self.launch.source_url.clone(),
            source_hash: self.launch.source_hash.clone(),
            genesis_url: self.launch.genesis_url.clone(),
            genesis_hash: self.launch.genesis_hash.clone(),
            launch_time: self.launch.launch_time,
        }
    }

    /// Chain configuration with its home under `root`
    pub fn chain_config(&self, root: &Path) -> ChainConfig {
        let mut config = ChainConfig::from_launch(self.launch(), root);
        if let Some(prefix) = &self.launch.address_prefix {
            config = config.with_address_prefix(prefix);
        }
        if let Some(entrypoint) = &self.launch.entrypoint {
            config = config.with_entrypoint(entrypoint);
        }
        if let Some(port) = self.launch.tunnel_base_port {
            config = config.with_tunnel_base_port(port);
        }
        config
    }

    /// Runtime configuration for the chain home under `root`.
    ///
    /// Binaries go to `root/bin` unless the file names a directory.
    pub fn runtime_config(&self, root: &Path) -> RuntimeConfig {
        let runtime = &self.runtime;
        let bin_dir = runtime.bin_dir.clone().unwrap_or_else(|| root.join(BIN_DIR));
        let mut config = RuntimeConfig::new(
            &self.launch.chain_id,
            &runtime.binary_name,
            root.join(self.launch_id().to_string()),
            bin_dir,
        );
        if let Some(moniker) = &runtime.moniker {
            config = config.with_moniker(moniker);
        }
        if let Some(command) = &runtime.build_command {
            config = config.with_build_command(command.clone());
        }
        if let Some(backend) = &runtime.keyring_backend {
            config = config.with_keyring_backend(backend);
        }
        config
    }

    /// Contributions in file order, with gentx files read
    pub fn genesis_information(&self) -> eyre::Result<GenesisInformation> {
        let mut info = GenesisInformation::new();
        for account in &self.genesis.accounts {
            info = info.with_account(account.clone());
        }
        for account in &self.genesis.vesting_accounts {
            info = info.with_vesting_account(account.clone());
        }
        for (index, validator) in self.genesis.validators.iter().enumerate() {
            let gentx = match (&validator.gentx, &validator.gentx_file) {
                (Some(gentx), None) => gentx.clone().into_bytes(),
                (None, Some(file)) => {
                    let path = self.base_dir.join(file);
                    std::fs::read(&path)
                        .wrap_err_with(|| format!("failed to read gentx {}", path.display()))?
                }
                _ => bail!("validator {index} ({}) needs exactly one of gentx and gentx_file", validator.peer.id),
            };
            info = info.with_validator(GenesisValidator::new(gentx, validator.peer.clone()));
        }
        Ok(info)
    }
}
