//! Launchpad Source Fetcher
//!
//! Reproducible acquisition of a chain's source code at a specific point in
//! its history.
//!
//! ```text
//! SourceReference { url, branch | tag, pinned hash? }
//!      │
//!      │  clone into a fresh temp dir (single branch when named)
//!      ▼
//! pinned hash? ──yes──► resolve + checkout exactly that commit
//!      │ no
//!      ▼
//! record HEAD ───────► FetchedSource { temp dir, resolved hash }
//! ```
//!
//! The resolved hash keys the build cache, so an unpinned fetch still
//! records exactly what it checked out.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod entrypoint;
mod fetcher;
mod reference;
mod vcs;

pub use entrypoint::verify_entrypoint;
pub use fetcher::{FetchedSource, SourceFetcher};
pub use reference::{CommitHash, GitRef, SourceReference};
pub use tokio_util::sync::CancellationToken;
pub use vcs::{Git2Backend, VersionControl};

use std::path::PathBuf;
use thiserror::Error;

/// Source acquisition errors
#[derive(Debug, Error)]
pub enum SourceError {
    /// The remote could not be reached or the named reference does not exist
    #[error("source {url} is unavailable: {source}")]
    SourceUnavailable {
        /// Remote that was cloned
        url: String,
        /// Underlying git error
        #[source]
        source: git2::Error,
    },

    /// A pinned revision is absent from the fetched history
    #[error("revision {revision} not found: {source}")]
    RevisionNotFound {
        /// Requested revision
        revision: String,
        /// Underlying git error
        #[source]
        source: git2::Error,
    },

    /// Checking out a resolved commit failed
    #[error("cannot check out {commit}: {source}")]
    Checkout {
        /// Commit being checked out
        commit: CommitHash,
        /// Underlying git error
        #[source]
        source: git2::Error,
    },

    /// No entrypoint file exists in the fetched tree
    #[error("no {file_name} entrypoint found under {}", root.display())]
    EntrypointNotFound {
        /// Entrypoint file name looked for
        file_name: String,
        /// Root of the searched tree
        root: PathBuf,
    },

    /// More than one entrypoint file exists in the fetched tree
    #[error("multiple {file_name} entrypoints found: {candidates:?}")]
    AmbiguousEntrypoint {
        /// Entrypoint file name looked for
        file_name: String,
        /// Every matching path
        candidates: Vec<PathBuf>,
    },

    /// The fetch observed cancellation
    #[error("source fetch cancelled")]
    Cancelled,

    /// Other git error
    #[error("git error: {0}")]
    Git(#[from] git2::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The blocking fetch task panicked or was aborted
    #[error("fetch task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

#[cfg(test)]
pub(crate) mod fixture {
    //! Upstream repositories built on the fly for fetch tests.

    use git2::{Oid, Repository, Signature};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;
    use walkdir::WalkDir;

    /// A local repository standing in for a remote
    pub(crate) struct Upstream {
        dir: TempDir,
        repo: Repository,
    }

    impl Upstream {
        pub(crate) fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let repo = Repository::init(dir.path()).unwrap();
            Self { dir, repo }
        }

        pub(crate) fn url(&self) -> String {
            self.dir.path().display().to_string()
        }

        /// Write `file` and commit it on the current branch
        pub(crate) fn commit(&self, file: &str, contents: &str) -> Oid {
            let workdir = self.repo.workdir().unwrap();
            let path = workdir.join(file);
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, contents).unwrap();

            let mut index = self.repo.index().unwrap();
            index.add_path(Path::new(file)).unwrap();
            index.write().unwrap();
            let tree = self.repo.find_tree(index.write_tree().unwrap()).unwrap();

            let signature = Signature::now("launchpad", "launchpad@example.com").unwrap();
            let parent = self.repo.head().ok().and_then(|head| head.peel_to_commit().ok());
            let parents: Vec<_> = parent.iter().collect();
            self.repo
                .commit(Some("HEAD"), &signature, &signature, contents, &tree, &parents)
                .unwrap()
        }

        pub(crate) fn branch(&self, name: &str, at: Oid) {
            let commit = self.repo.find_commit(at).unwrap();
            self.repo.branch(name, &commit, false).unwrap();
        }

        pub(crate) fn tag(&self, name: &str, at: Oid) {
            let object = self.repo.find_object(at, None).unwrap();
            self.repo.tag_lightweight(name, &object, false).unwrap();
        }
    }

    /// Every file under `root` except `.git`, with its contents
    pub(crate) fn tree_contents(root: &Path) -> Vec<(PathBuf, Vec<u8>)> {
        let mut files: Vec<_> = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| entry.file_name() != ".git")
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| {
                let relative = entry.path().strip_prefix(root).unwrap().to_path_buf();
                (relative, std::fs::read(entry.path()).unwrap())
            })
            .collect();
        files.sort();
        files
    }
}
