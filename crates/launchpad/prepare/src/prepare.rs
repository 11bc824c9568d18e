//! The preparation state machine

use crate::{Chain, PrepareError};
use launchpad_genesis::{GenesisAssembler, GenesisError, GenesisInformation, GenesisSnapshot};
use launchpad_peers::{PeerConfiguration, PeerNetworkConfigurator, apply_node_config, write_tunnel_record};
use launchpad_runtime::ChainRuntime;
use std::path::PathBuf;
use tracing::{debug, error, info};

/// Where preparation is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreparationState {
    /// No chain home yet
    Uninitialized,
    /// A chain home from an earlier preparation exists
    HasHome,
    /// Building and creating a fresh home
    Initializing,
    /// Rebuilding and resetting the existing home's genesis
    Rebuilding,
    /// Applying contributions and peer configuration
    GenesisBuilding,
    /// Checking the genesis and resetting local state
    Validating,
    /// Done
    Ready,
}

/// A chain ready to start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prepared {
    /// Daemon binary
    pub binary: PathBuf,
    /// Chain home
    pub home: PathBuf,
}

impl Prepared {
    /// Command line that starts the node
    pub fn start_command(&self) -> String {
        format!("{} start --home {}", self.binary.display(), self.home.display())
    }
}

impl<R: ChainRuntime + ?Sized> Chain<R> {
    /// Prepare the chain home for launch with `info`.
    ///
    /// A missing home is initialised from scratch; an existing one keeps its
    /// validator key and has its genesis rebuilt.
    pub async fn prepare(&self, info: &GenesisInformation) -> Result<Prepared, PrepareError> {
        // descriptors are validated before anything on disk is touched
        let peers = PeerNetworkConfigurator::new(self.config.tunnel_base_port).configure(&info.peers())?;

        let mut state = if self.is_home_dir_exist()? {
            PreparationState::HasHome
        } else {
            PreparationState::Uninitialized
        };
        let mut binary = None;

        loop {
            if self.cancel.is_cancelled() {
                return Err(PrepareError::Cancelled);
            }
            debug!(target: "launchpad::prepare", chain_id = %self.id(), ?state, "Preparation state");

            state = match state {
                PreparationState::Uninitialized => PreparationState::Initializing,
                PreparationState::HasHome => PreparationState::Rebuilding,
                PreparationState::Initializing => {
                    binary = Some(self.build().await?);
                    self.init().await?;
                    PreparationState::GenesisBuilding
                }
                PreparationState::Rebuilding => {
                    binary = Some(self.build().await?);
                    self.init_genesis().await?;
                    PreparationState::GenesisBuilding
                }
                PreparationState::GenesisBuilding => {
                    self.build_genesis(info, &peers).await?;
                    PreparationState::Validating
                }
                PreparationState::Validating => {
                    self.validate().await?;
                    PreparationState::Ready
                }
                PreparationState::Ready => {
                    let prepared = Prepared {
                        binary: binary.unwrap_or_else(|| self.binary()),
                        home: self.home().to_path_buf(),
                    };
                    info!(target: "launchpad::prepare", chain_id = %self.id(), launch_id = %self.launch_id(), "Blockchain ready");
                    return Ok(prepared);
                }
            };
        }
    }

    /// Fresh validator key, default config and genesis
    async fn init(&self) -> Result<(), PrepareError> {
        self.events.ongoing("Initializing the blockchain");
        self.run_step(self.runtime.init_validator(), "error initializing the blockchain").await?;
        if let Some(genesis) = &self.config.initial_genesis {
            genesis.install(&self.runtime.genesis_path()).await?;
        }
        self.events.done("Blockchain initialized");
        Ok(())
    }

    /// Genesis back to its initial content, key and config kept
    async fn init_genesis(&self) -> Result<(), PrepareError> {
        self.events.ongoing("Initializing the genesis");
        match &self.config.initial_genesis {
            Some(genesis) => genesis.install(&self.runtime.genesis_path()).await?,
            None => {
                self.run_step(self.runtime.init_genesis(), "error initializing the genesis").await?;
            }
        }
        self.events.done("Genesis initialized");
        Ok(())
    }

    /// Apply the contributions, then the peer configuration. Genesis and node
    /// config are both restored when the peer configuration cannot be written.
    async fn build_genesis(
        &self,
        info: &GenesisInformation,
        peers: &PeerConfiguration,
    ) -> Result<(), PrepareError> {
        self.events.ongoing("Building the genesis");

        let genesis = GenesisSnapshot::capture(&self.runtime.genesis_path())?;
        GenesisAssembler::new(self.runtime.as_ref())
            .with_cancel(self.cancel.clone())
            .build(info, &self.config.address_prefix, self.config.genesis_time)
            .await
            .map_err(|err| match err {
                GenesisError::Cancelled => PrepareError::Cancelled,
                err => err.into(),
            })?;

        let config = GenesisSnapshot::capture(&self.runtime.config_path())?;
        if let Err(err) = self.write_peer_config(peers) {
            for snapshot in [&config, &genesis] {
                if let Err(restore) = snapshot.restore() {
                    error!(target: "launchpad::prepare", %restore, "Failed to restore snapshot");
                }
            }
            return Err(err);
        }

        self.events.done("Genesis built");
        Ok(())
    }

    fn write_peer_config(&self, peers: &PeerConfiguration) -> Result<(), PrepareError> {
        apply_node_config(&self.runtime.config_path(), &peers.node)?;
        write_tunnel_record(&self.runtime.tunnels_path(), &peers.tunnels)?;
        Ok(())
    }

    async fn validate(&self) -> Result<(), PrepareError> {
        self.events.ongoing("Validating the genesis");
        self.run_step(self.runtime.validate_genesis(), "error validating the genesis").await?;
        self.run_step(self.runtime.unsafe_reset_state(), "error resetting the blockchain state").await?;
        self.events.done("Genesis validated");
        Ok(())
    }
}
