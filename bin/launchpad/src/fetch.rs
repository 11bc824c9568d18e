//! `launchpad fetch`

use clap::Parser;
use launchpad_source::{CancellationToken, SourceFetcher, SourceReference};

/// Fetch command arguments
#[derive(Debug, Parser)]
pub(crate) struct FetchArgs {
    /// Repository url
    url: String,

    /// Branch to clone instead of the default one
    #[arg(long, conflicts_with = "tag")]
    branch: Option<String>,

    /// Tag to clone
    #[arg(long)]
    tag: Option<String>,

    /// Commit to check out
    #[arg(long)]
    hash: Option<String>,
}

impl FetchArgs {
    pub(crate) async fn run(self, cancel: CancellationToken) -> eyre::Result<()> {
        let mut reference = match (self.branch, self.tag) {
            (Some(branch), _) => SourceReference::branch(self.url, branch),
            (None, Some(tag)) => SourceReference::tag(self.url, tag),
            (None, None) => SourceReference::remote(self.url),
        };
        if let Some(hash) = self.hash {
            reference = reference.with_pin(hash);
        }

        let source = SourceFetcher::git().fetch(&reference, &cancel).await?;
        let (path, hash) = source.keep();
        println!("✔ Fetched {reference} at {hash} into {}", path.display());
        Ok(())
    }
}
