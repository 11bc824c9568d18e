//! Version-control capability and its `git2` implementation.

use crate::{CommitHash, GitRef, SourceError};
use git2::{
    AutotagOption, FetchOptions, Oid, RemoteCallbacks, Repository,
    build::{CheckoutBuilder, RepoBuilder},
};
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// The operations a fetch needs from a version-control system.
///
/// Implementations are blocking; the fetcher runs them on the blocking pool.
pub trait VersionControl: Send + Sync + 'static {
    /// Handle to a cloned repository
    type Repository: Send;

    /// Clone `url` into the empty directory `into`, restricted to `reference`.
    ///
    /// A tag reference leaves the tag's commit checked out.
    fn clone_repo(
        &self,
        url: &str,
        reference: &GitRef,
        into: &Path,
        cancel: &CancellationToken,
    ) -> Result<Self::Repository, SourceError>;

    /// Resolve `revision` to a full commit id
    fn resolve_revision(
        &self,
        repo: &Self::Repository,
        revision: &str,
    ) -> Result<CommitHash, SourceError>;

    /// Force-checkout `commit` with a detached HEAD
    fn checkout(&self, repo: &Self::Repository, commit: &CommitHash) -> Result<(), SourceError>;

    /// Commit currently checked out
    fn head(&self, repo: &Self::Repository) -> Result<CommitHash, SourceError>;
}

/// [`VersionControl`] backed by libgit2
#[derive(Debug, Default, Clone, Copy)]
#[non_exhaustive]
pub struct Git2Backend;

impl Git2Backend {
    /// Create a new backend
    pub const fn new() -> Self {
        Self
    }
}

impl VersionControl for Git2Backend {
    type Repository = Repository;

    fn clone_repo(
        &self,
        url: &str,
        reference: &GitRef,
        into: &Path,
        cancel: &CancellationToken,
    ) -> Result<Repository, SourceError> {
        let unavailable =
            |source: git2::Error| SourceError::SourceUnavailable { url: url.to_owned(), source };

        let mut callbacks = RemoteCallbacks::new();
        // returning false aborts the transfer
        callbacks.transfer_progress(|_| !cancel.is_cancelled());

        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(callbacks);

        let mut builder = RepoBuilder::new();
        match reference {
            GitRef::DefaultBranch => {}
            GitRef::Branch(branch) => {
                let tracked = branch.clone();
                builder.branch(branch);
                builder.remote_create(move |repo, name, url| {
                    let refspec = format!("+refs/heads/{tracked}:refs/remotes/{name}/{tracked}");
                    repo.remote_with_fetch(name, url, &refspec)
                });
            }
            GitRef::Tag(_) => {
                fetch.download_tags(AutotagOption::All);
            }
        }
        builder.fetch_options(fetch);

        debug!(target: "launchpad::source", url, ?reference, into = %into.display(), "Cloning");
        let repo = builder.clone(url, into).map_err(|source| {
            if cancel.is_cancelled() { SourceError::Cancelled } else { unavailable(source) }
        })?;

        if let GitRef::Tag(tag) = reference {
            let commit = repo
                .revparse_single(&format!("refs/tags/{tag}"))
                .and_then(|object| object.peel_to_commit())
                .map_err(unavailable)?
                .id();
            checkout_detached(&repo, commit).map_err(|source| SourceError::Checkout {
                commit: commit.into(),
                source,
            })?;
        }

        Ok(repo)
    }

    fn resolve_revision(
        &self,
        repo: &Repository,
        revision: &str,
    ) -> Result<CommitHash, SourceError> {
        repo.revparse_single(revision)
            .and_then(|object| object.peel_to_commit())
            .map(|commit| commit.id().into())
            .map_err(|source| SourceError::RevisionNotFound {
                revision: revision.to_owned(),
                source,
            })
    }

    fn checkout(&self, repo: &Repository, commit: &CommitHash) -> Result<(), SourceError> {
        let oid = Oid::from_str(commit.as_str()).map_err(|source| {
            SourceError::RevisionNotFound { revision: commit.to_string(), source }
        })?;
        checkout_detached(repo, oid)
            .map_err(|source| SourceError::Checkout { commit: commit.clone(), source })
    }

    fn head(&self, repo: &Repository) -> Result<CommitHash, SourceError> {
        let commit = repo.head()?.peel_to_commit()?;
        Ok(commit.id().into())
    }
}

fn checkout_detached(repo: &Repository, oid: Oid) -> Result<(), git2::Error> {
    let commit = repo.find_commit(oid)?;
    let mut options = CheckoutBuilder::new();
    options.force();
    repo.checkout_tree(commit.as_object(), Some(&mut options))?;
    repo.set_head_detached(oid)
}
