//! Filesystem helpers shared by the launchpad crates.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

use std::{
    io::{self, Write},
    path::Path,
};

/// Replace `path` with `contents`.
///
/// The bytes go to a temp file in the same directory, are synced, then
/// renamed over `path`. Readers see either the old file or the new one.
/// Missing parent directories are created.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    let dir = path.parent().filter(|dir| !dir.as_os_str().is_empty()).unwrap_or(Path::new("."));
    std::fs::create_dir_all(dir)?;
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| err.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replaces_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "old").unwrap();

        write_atomic(&path, b"new").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("home/config/genesis.json");

        write_atomic(&path, b"{}").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"{}");
    }

    #[test]
    fn failed_write_leaves_target_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tunnels.toml");
        std::fs::create_dir(&path).unwrap();

        assert!(write_atomic(&path, b"x").is_err());
        assert!(path.is_dir());
        // the temp file is cleaned up on failure
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
