//! Fetching sources into owned temporary snapshots.

use crate::{CommitHash, Git2Backend, SourceError, SourceReference, VersionControl};
use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tempfile::TempDir;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// A source tree checked out at a resolved commit.
///
/// The directory is removed when this value is dropped.
#[derive(Debug)]
pub struct FetchedSource {
    dir: TempDir,
    hash: CommitHash,
}

impl FetchedSource {
    /// Root of the checked out tree
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Commit the tree was checked out at
    pub const fn hash(&self) -> &CommitHash {
        &self.hash
    }

    /// Keep the tree on disk past this value's lifetime
    pub fn keep(self) -> (PathBuf, CommitHash) {
        (self.dir.keep(), self.hash)
    }
}

/// Fetches [`SourceReference`]s through a [`VersionControl`] backend
#[derive(Debug)]
pub struct SourceFetcher<V = Git2Backend> {
    vcs: Arc<V>,
}

impl<V> Clone for SourceFetcher<V> {
    fn clone(&self) -> Self {
        Self { vcs: Arc::clone(&self.vcs) }
    }
}

impl SourceFetcher<Git2Backend> {
    /// Fetcher backed by libgit2
    pub fn git() -> Self {
        Self::new(Git2Backend::new())
    }
}

impl<V: VersionControl> SourceFetcher<V> {
    /// Create a fetcher over `vcs`
    pub fn new(vcs: V) -> Self {
        Self { vcs: Arc::new(vcs) }
    }

    /// Clone `reference` into a fresh temporary directory and check out the
    /// commit it resolves to.
    pub async fn fetch(
        &self,
        reference: &SourceReference,
        cancel: &CancellationToken,
    ) -> Result<FetchedSource, SourceError> {
        if cancel.is_cancelled() {
            return Err(SourceError::Cancelled);
        }

        info!(target: "launchpad::source", source = %reference, "Fetching the source code");

        let dir = tempfile::Builder::new().prefix("launchpad-source-").tempdir()?;
        let vcs = Arc::clone(&self.vcs);
        let into = dir.path().to_path_buf();
        let reference = reference.clone();
        let cancel = cancel.clone();

        let hash = tokio::task::spawn_blocking(move || {
            checkout_reference(vcs.as_ref(), &reference, &into, &cancel)
        })
        .await??;

        info!(target: "launchpad::source", %hash, "Source code fetched");
        Ok(FetchedSource { dir, hash })
    }

    /// Fetch every reference concurrently, returning the sources in input
    /// order.
    ///
    /// The first failure cancels the remaining fetches; their temporary
    /// directories are released before the error is returned.
    pub async fn fetch_all(
        &self,
        references: Vec<SourceReference>,
        cancel: &CancellationToken,
    ) -> Result<Vec<FetchedSource>, SourceError> {
        let group = cancel.child_token();
        let mut tasks = JoinSet::new();
        for (index, reference) in references.into_iter().enumerate() {
            let fetcher = self.clone();
            let token = group.clone();
            tasks.spawn(async move { (index, fetcher.fetch(&reference, &token).await) });
        }

        let mut fetched: Vec<Option<FetchedSource>> = (0..tasks.len()).map(|_| None).collect();
        let mut failure = None;
        while let Some(joined) = tasks.join_next().await {
            let outcome = match joined {
                Ok((index, result)) => result.map(|source| (index, source)),
                Err(err) => Err(err.into()),
            };
            match outcome {
                Ok((index, source)) => fetched[index] = Some(source),
                Err(err) if failure.is_none() => {
                    warn!(target: "launchpad::source", %err, "Fetch failed, cancelling the group");
                    group.cancel();
                    failure = Some(err);
                }
                Err(_) => {}
            }
        }

        match failure {
            Some(err) => Err(err),
            None => Ok(fetched.into_iter().flatten().collect()),
        }
    }
}

fn checkout_reference<V: VersionControl>(
    vcs: &V,
    reference: &SourceReference,
    into: &Path,
    cancel: &CancellationToken,
) -> Result<CommitHash, SourceError> {
    let repo = vcs.clone_repo(reference.url(), reference.reference(), into, cancel)?;
    if cancel.is_cancelled() {
        return Err(SourceError::Cancelled);
    }

    match reference.pinned_hash() {
        Some(pin) => {
            let commit = vcs.resolve_revision(&repo, pin)?;
            vcs.checkout(&repo, &commit)?;
            Ok(commit)
        }
        None => vcs.head(&repo),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixture::{Upstream, tree_contents};
    use assert_matches::assert_matches;

    #[tokio::test(flavor = "multi_thread")]
    async fn pinned_fetch_is_reproducible() {
        let upstream = Upstream::new();
        let first = upstream.commit("app/app.go", "package app // v1");
        upstream.commit("app/app.go", "package app // v2");

        let fetcher = SourceFetcher::git();
        let reference = SourceReference::pinned(upstream.url(), first.to_string());
        let cancel = CancellationToken::new();

        let a = fetcher.fetch(&reference, &cancel).await.unwrap();
        let b = fetcher.fetch(&reference, &cancel).await.unwrap();

        assert_eq!(a.hash(), &CommitHash::from(first));
        assert_eq!(a.hash(), b.hash());
        assert_ne!(a.path(), b.path());
        assert_eq!(tree_contents(a.path()), tree_contents(b.path()));
        assert_eq!(
            std::fs::read_to_string(a.path().join("app/app.go")).unwrap(),
            "package app // v1"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unpinned_fetch_records_head() {
        let upstream = Upstream::new();
        upstream.commit("app/app.go", "package app // v1");
        let tip = upstream.commit("app/app.go", "package app // v2");

        let fetched = SourceFetcher::git()
            .fetch(&SourceReference::remote(upstream.url()), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(fetched.hash(), &CommitHash::from(tip));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn branch_and_tag_resolve_their_commits() {
        let upstream = Upstream::new();
        let release = upstream.commit("app/app.go", "package app // release");
        upstream.branch("release", release);
        upstream.tag("v1.0.0", release);
        upstream.commit("app/app.go", "package app // main");

        let fetcher = SourceFetcher::git();
        let cancel = CancellationToken::new();

        let branch = fetcher
            .fetch(&SourceReference::branch(upstream.url(), "release"), &cancel)
            .await
            .unwrap();
        assert_eq!(branch.hash(), &CommitHash::from(release));

        let tag = fetcher.fetch(&SourceReference::tag(upstream.url(), "v1.0.0"), &cancel).await.unwrap();
        assert_eq!(tag.hash(), &CommitHash::from(release));
        assert_eq!(
            std::fs::read_to_string(tag.path().join("app/app.go")).unwrap(),
            "package app // release"
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn missing_pin_is_revision_not_found() {
        let upstream = Upstream::new();
        upstream.commit("app/app.go", "package app");

        let reference =
            SourceReference::pinned(upstream.url(), "0123456789abcdef0123456789abcdef01234567");
        let err = SourceFetcher::git().fetch(&reference, &CancellationToken::new()).await.unwrap_err();
        assert_matches!(err, SourceError::RevisionNotFound { .. });
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_remote_and_missing_branch_are_unavailable() {
        let upstream = Upstream::new();
        upstream.commit("app/app.go", "package app");
        let nowhere = tempfile::tempdir().unwrap();

        let fetcher = SourceFetcher::git();
        let cancel = CancellationToken::new();

        let missing_remote = SourceReference::remote(nowhere.path().join("absent").display().to_string());
        assert_matches!(
            fetcher.fetch(&missing_remote, &cancel).await,
            Err(SourceError::SourceUnavailable { .. })
        );

        let missing_branch = SourceReference::branch(upstream.url(), "does-not-exist");
        assert_matches!(
            fetcher.fetch(&missing_branch, &cancel).await,
            Err(SourceError::SourceUnavailable { .. })
        );
    }

    #[tokio::test]
    async fn cancelled_token_stops_fetch() {
        let upstream = Upstream::new();
        upstream.commit("app/app.go", "package app");

        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_matches!(
            SourceFetcher::git().fetch(&SourceReference::remote(upstream.url()), &cancel).await,
            Err(SourceError::Cancelled)
        );
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropping_source_removes_tree() {
        let upstream = Upstream::new();
        upstream.commit("app/app.go", "package app");

        let fetched = SourceFetcher::git()
            .fetch(&SourceReference::remote(upstream.url()), &CancellationToken::new())
            .await
            .unwrap();
        let path = fetched.path().to_path_buf();
        assert!(path.join("app/app.go").exists());
        drop(fetched);
        assert!(!path.exists());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_all_keeps_input_order() {
        let first = Upstream::new();
        let first_tip = first.commit("app/app.go", "package app // first");
        let second = Upstream::new();
        let second_tip = second.commit("app/app.go", "package app // second");

        let fetched = SourceFetcher::git()
            .fetch_all(
                vec![SourceReference::remote(first.url()), SourceReference::remote(second.url())],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let hashes: Vec<_> = fetched.iter().map(|source| source.hash().clone()).collect();
        assert_eq!(hashes, vec![CommitHash::from(first_tip), CommitHash::from(second_tip)]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn fetch_all_fails_fast() {
        let upstream = Upstream::new();
        upstream.commit("app/app.go", "package app");

        let cancel = CancellationToken::new();
        let err = SourceFetcher::git()
            .fetch_all(
                vec![
                    SourceReference::remote(upstream.url()),
                    SourceReference::branch(upstream.url(), "does-not-exist"),
                    SourceReference::remote(upstream.url()),
                ],
                &cancel,
            )
            .await
            .unwrap_err();

        assert_matches!(err, SourceError::SourceUnavailable { .. });
        // the group token is a child; the caller's token is untouched
        assert!(!cancel.is_cancelled());
    }
}
