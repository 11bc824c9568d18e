//! `launchpad prepare`

use crate::print_events;
use clap::Parser;
use eyre::WrapErr;
use launchpad_cli::{default_root, parse_launch_file};
use launchpad_prepare::{Chain, ChainConfig, EventBus, GenesisInformation, PrepareError, Prepared};
use launchpad_runtime::CliRuntime;
use launchpad_source::{CancellationToken, SourceFetcher};
use std::{path::PathBuf, sync::Arc};
use tracing::info;

/// Prepare command arguments
#[derive(Debug, Parser)]
pub(crate) struct PrepareArgs {
    /// Launch file describing the launch and its contributions
    #[arg(long)]
    launch_file: PathBuf,

    /// Directory holding chain homes and build records
    #[arg(long, env = "LAUNCHPAD_ROOT")]
    root: Option<PathBuf>,
}

impl PrepareArgs {
    pub(crate) async fn run(self, cancel: CancellationToken) -> eyre::Result<()> {
        let file = parse_launch_file(&self.launch_file)?;
        let info = file.genesis_information()?;
        let root = self.root.unwrap_or_else(default_root);

        info!(
            target: "launchpad::cli",
            launch_id = %file.launch_id(),
            chain_id = file.chain_id(),
            root = %root.display(),
            "Preparing launch"
        );

        let runtime = Arc::new(CliRuntime::new(file.runtime_config(&root)));
        let (events, printer) = print_events();
        let result = prepare_chain(file.chain_config(&root), runtime, &info, events, cancel).await;

        // the chain, and with it the last sender, is gone
        printer.await?;
        let prepared =
            result.wrap_err_with(|| format!("failed to prepare launch {}", file.launch_id()))?;
        println!("\nThe blockchain is ready, start it with:\n\n\t{}\n", prepared.start_command());
        Ok(())
    }
}

async fn prepare_chain(
    config: ChainConfig,
    runtime: Arc<CliRuntime>,
    info: &GenesisInformation,
    events: EventBus,
    cancel: CancellationToken,
) -> Result<Prepared, PrepareError> {
    let chain = Chain::new(config, runtime, &SourceFetcher::git(), events, cancel).await?;
    chain.prepare(info).await
}
