//! The on-disk record file.

use crate::{BinaryChecksum, CacheError, ChecksumError, LaunchId, binary_checksum};
use launchpad_fs_util::write_atomic;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tracing::{debug, info};

/// What a launch's binary was last built from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedBinaryRecord {
    /// Launch the binary belongs to
    pub launch_id: LaunchId,
    /// Source commit the binary was built from
    pub source_hash: String,
    /// SHA-256 of the built binary
    pub binary_checksum: BinaryChecksum,
}

/// Outcome of [`BuildCache::lookup`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup {
    /// The binary at this path is up to date
    Hit(PathBuf),
    /// The binary must be rebuilt
    Miss,
}

impl CacheLookup {
    /// Whether the lookup hit
    pub const fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Entry {
    source_hash: String,
    binary_checksum: BinaryChecksum,
}

type Records = BTreeMap<LaunchId, Entry>;

/// Build records persisted as one JSON file.
///
/// Rewrites go through a temp file in the same directory followed by a
/// rename. There is no cross-process lock; concurrent preparation of the same
/// launch is unsupported.
#[derive(Debug, Clone)]
pub struct BuildCache {
    path: PathBuf,
}

impl BuildCache {
    /// Cache backed by the record file at `path`, created on first store
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Record file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether `binary` is still the one built for `launch` from `source_hash`
    pub fn lookup(
        &self,
        launch: LaunchId,
        source_hash: &str,
        binary: &Path,
    ) -> Result<CacheLookup, CacheError> {
        if launch.is_none() {
            return Ok(CacheLookup::Miss);
        }

        let Some(record) = self.record(launch)? else {
            debug!(target: "launchpad::cache", launch_id = %launch, "No build record");
            return Ok(CacheLookup::Miss);
        };
        if record.source_hash != source_hash {
            debug!(
                target: "launchpad::cache",
                launch_id = %launch,
                recorded = %record.source_hash,
                current = %source_hash,
                "Source changed since last build"
            );
            return Ok(CacheLookup::Miss);
        }

        let checksum = match binary_checksum(binary) {
            Ok(checksum) => checksum,
            Err(ChecksumError::NotFound(_)) => {
                debug!(target: "launchpad::cache", binary = %binary.display(), "Binary missing");
                return Ok(CacheLookup::Miss);
            }
            Err(err) => return Err(err.into()),
        };
        if checksum != record.binary_checksum {
            debug!(target: "launchpad::cache", launch_id = %launch, "Binary changed since last build");
            return Ok(CacheLookup::Miss);
        }

        info!(target: "launchpad::cache", launch_id = %launch, binary = %binary.display(), "Build cache hit");
        Ok(CacheLookup::Hit(binary.to_path_buf()))
    }

    /// Remember that `checksum` was built for `launch` from `source_hash`,
    /// replacing any earlier record for the launch.
    pub fn store(
        &self,
        launch: LaunchId,
        source_hash: &str,
        checksum: &BinaryChecksum,
    ) -> Result<(), CacheError> {
        if launch.is_none() {
            return Ok(());
        }

        let mut records = self.load()?;
        records.insert(
            launch,
            Entry { source_hash: source_hash.to_owned(), binary_checksum: checksum.clone() },
        );
        self.persist(&records)?;

        info!(target: "launchpad::cache", launch_id = %launch, %source_hash, %checksum, "Build recorded");
        Ok(())
    }

    /// The record stored for `launch`, if any
    pub fn record(&self, launch: LaunchId) -> Result<Option<CachedBinaryRecord>, CacheError> {
        Ok(self.load()?.remove(&launch).map(|entry| CachedBinaryRecord {
            launch_id: launch,
            source_hash: entry.source_hash,
            binary_checksum: entry.binary_checksum,
        }))
    }

    fn load(&self) -> Result<Records, CacheError> {
        let data = match std::fs::read(&self.path) {
            Ok(data) => data,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Records::new()),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&data)
            .map_err(|source| CacheError::Corrupted { path: self.path.clone(), source })
    }

    fn persist(&self, records: &Records) -> Result<(), CacheError> {
        let mut data = serde_json::to_vec_pretty(records)?;
        data.push(b'\n');
        write_atomic(&self.path, &data)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use tempfile::TempDir;

    const SOURCE: &str = "1f6bbd3c5b5d0b0a5f7e5fa0e2f0dd4ad0f6a1c2";

    fn setup() -> (TempDir, BuildCache, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let cache = BuildCache::new(dir.path().join("binary-cache.json"));
        let binary = dir.path().join("chaind");
        std::fs::write(&binary, b"chaind v1").unwrap();
        (dir, cache, binary)
    }

    fn store_current(cache: &BuildCache, launch: LaunchId, binary: &Path) {
        let checksum = binary_checksum(binary).unwrap();
        cache.store(launch, SOURCE, &checksum).unwrap();
    }

    #[test]
    fn hit_after_store() {
        let (_dir, cache, binary) = setup();
        let launch = LaunchId(7);

        assert_eq!(cache.lookup(launch, SOURCE, &binary).unwrap(), CacheLookup::Miss);
        store_current(&cache, launch, &binary);
        assert_eq!(cache.lookup(launch, SOURCE, &binary).unwrap(), CacheLookup::Hit(binary.clone()));
    }

    #[test]
    fn changed_binary_or_source_misses() {
        let (_dir, cache, binary) = setup();
        let launch = LaunchId(7);
        store_current(&cache, launch, &binary);

        assert_eq!(cache.lookup(launch, "another-commit", &binary).unwrap(), CacheLookup::Miss);

        std::fs::write(&binary, b"chaind v1 (patched)").unwrap();
        assert_eq!(cache.lookup(launch, SOURCE, &binary).unwrap(), CacheLookup::Miss);
    }

    #[test]
    fn missing_binary_misses() {
        let (_dir, cache, binary) = setup();
        let launch = LaunchId(7);
        store_current(&cache, launch, &binary);

        std::fs::remove_file(&binary).unwrap();
        assert_eq!(cache.lookup(launch, SOURCE, &binary).unwrap(), CacheLookup::Miss);
    }

    #[test]
    fn launch_zero_is_never_cached() {
        let (_dir, cache, binary) = setup();
        store_current(&cache, LaunchId::NONE, &binary);

        assert!(!cache.path().exists());
        assert_eq!(cache.lookup(LaunchId::NONE, SOURCE, &binary).unwrap(), CacheLookup::Miss);
    }

    #[test]
    fn one_record_per_launch() {
        let (_dir, cache, binary) = setup();
        store_current(&cache, LaunchId(1), &binary);
        store_current(&cache, LaunchId(2), &binary);

        let checksum = binary_checksum(&binary).unwrap();
        cache.store(LaunchId(1), "newer-commit", &checksum).unwrap();

        let record = cache.record(LaunchId(1)).unwrap().unwrap();
        assert_eq!(record.source_hash, "newer-commit");
        assert_eq!(cache.record(LaunchId(2)).unwrap().unwrap().source_hash, SOURCE);
        assert!(cache.lookup(LaunchId(1), "newer-commit", &binary).unwrap().is_hit());
        assert!(!cache.lookup(LaunchId(1), SOURCE, &binary).unwrap().is_hit());
    }

    #[test]
    fn corrupted_record_file_is_an_error() {
        let (_dir, cache, binary) = setup();
        std::fs::write(cache.path(), "{ not json").unwrap();

        assert_matches!(
            cache.lookup(LaunchId(3), SOURCE, &binary),
            Err(CacheError::Corrupted { .. })
        );
    }
}
