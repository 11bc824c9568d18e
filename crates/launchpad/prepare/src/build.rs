use crate::{Chain, PrepareError};
use launchpad_cache::{BuildCache, CacheLookup, binary_checksum};
use launchpad_runtime::ChainRuntime;
use std::path::PathBuf;
use tracing::info;

impl<R: ChainRuntime + ?Sized> Chain<R> {
    /// Build the chain's binary unless the cached one was built from the
    /// same source and is unchanged on disk.
    pub async fn build(&self) -> Result<PathBuf, PrepareError> {
        let cache = BuildCache::new(&self.config.cache_path);
        let launch = self.config.launch_id;
        let source_hash = self.source.hash().as_str();

        if let CacheLookup::Hit(binary) = cache.lookup(launch, source_hash, &self.runtime.binary())? {
            self.events.done("Blockchain binary is up to date");
            return Ok(binary);
        }

        self.events.ongoing("Building the blockchain");
        let binary = self
            .run_step(self.runtime.build(self.source.path()), "error building the blockchain")
            .await?;
        self.events.done("Blockchain build complete");

        let checksum = binary_checksum(&binary)?;
        cache.store(launch, source_hash, &checksum)?;
        info!(target: "launchpad::prepare", launch_id = %launch, binary = %binary.display(), %checksum, "Blockchain built");
        Ok(binary)
    }
}
