//! Chain handle

use crate::{ChainConfig, EventBus, PrepareError};
use chrono::{DateTime, Utc};
use launchpad_cache::LaunchId;
use launchpad_genesis::reset_genesis_time;
use launchpad_runtime::{ChainRuntime, RuntimeError};
use launchpad_source::{
    CancellationToken, CommitHash, FetchedSource, SourceFetcher, VersionControl,
    verify_entrypoint,
};
use std::{
    future::Future,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::info;

/// A chain whose source has been fetched, ready to build and prepare.
///
/// The source tree lives as long as the handle.
#[derive(Debug)]
pub struct Chain<R: ?Sized> {
    pub(crate) config: ChainConfig,
    pub(crate) runtime: Arc<R>,
    pub(crate) source: FetchedSource,
    pub(crate) events: EventBus,
    pub(crate) cancel: CancellationToken,
}

impl<R: ChainRuntime + ?Sized> Chain<R> {
    /// Fetch the configured source and check its entrypoint.
    ///
    /// The configured home must be the one `runtime` operates on.
    pub async fn new<V: VersionControl>(
        config: ChainConfig,
        runtime: Arc<R>,
        fetcher: &SourceFetcher<V>,
        events: EventBus,
        cancel: CancellationToken,
    ) -> Result<Self, PrepareError> {
        if config.home != runtime.home() {
            return Err(PrepareError::HomeMismatch {
                config: config.home.clone(),
                runtime: runtime.home().to_path_buf(),
            });
        }

        events.ongoing("Fetching the source code");
        let source = fetcher.fetch(&config.source, &cancel).await?;
        events.done("Source code fetched");

        if let Some(file_name) = &config.entrypoint {
            let entrypoint = verify_entrypoint(source.path(), file_name)?;
            info!(target: "launchpad::prepare", entrypoint = %entrypoint.display(), "Entrypoint found");
        }

        info!(
            target: "launchpad::prepare",
            chain_id = %config.chain_id,
            launch_id = %config.launch_id,
            hash = %source.hash(),
            "Chain source ready"
        );
        Ok(Self { config, runtime, source, events, cancel })
    }

    /// Chain id
    pub fn id(&self) -> &str {
        &self.config.chain_id
    }

    /// Launch id, [`LaunchId::NONE`] outside a launch
    pub const fn launch_id(&self) -> LaunchId {
        self.config.launch_id
    }

    /// Chain home directory
    pub fn home(&self) -> &Path {
        &self.config.home
    }

    /// Source repository url
    pub fn source_url(&self) -> &str {
        self.config.source.url()
    }

    /// Commit the source was checked out at
    pub const fn source_hash(&self) -> &CommitHash {
        self.source.hash()
    }

    /// Root of the fetched source tree
    pub fn source_path(&self) -> &Path {
        self.source.path()
    }

    /// The configuration the chain was created with
    pub const fn config(&self) -> &ChainConfig {
        &self.config
    }

    /// The chain's runtime
    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    /// Whether the chain home exists, which means it was prepared before
    pub fn is_home_dir_exist(&self) -> Result<bool, PrepareError> {
        Ok(self.home().try_exists()?)
    }

    /// Where the built binary lives
    pub fn binary(&self) -> PathBuf {
        self.runtime.binary()
    }

    /// Id of the local node
    pub async fn node_id(&self) -> Result<String, PrepareError> {
        self.run_step(self.runtime.node_id(), "error reading the node id").await
    }

    /// Move the genesis time to now, for a launch that was reverted
    pub fn reset_genesis_time(&self) -> Result<DateTime<Utc>, PrepareError> {
        let time = reset_genesis_time(&self.runtime.genesis_path())?;
        self.events.done("Genesis time reset");
        Ok(time)
    }

    /// Run a runtime step, giving up when preparation is cancelled.
    ///
    /// Dropping the step kills any child process it spawned.
    pub(crate) async fn run_step<T>(
        &self,
        step: impl Future<Output = Result<T, RuntimeError>>,
        context: &'static str,
    ) -> Result<T, PrepareError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(PrepareError::Cancelled),
            result = step => result.map_err(|source| PrepareError::Runtime { context, source }),
        }
    }
}
