//! `launchpad revert-launch`

use clap::Parser;
use launchpad_cli::{default_root, parse_launch_file};
use launchpad_genesis::reset_genesis_time;
use launchpad_runtime::{ChainRuntime, CliRuntime};
use std::path::PathBuf;
use tracing::info;

/// Revert-launch command arguments
#[derive(Debug, Parser)]
pub(crate) struct RevertLaunchArgs {
    /// Launch file of the reverted launch
    #[arg(long)]
    launch_file: PathBuf,

    /// Directory holding chain homes and build records
    #[arg(long, env = "LAUNCHPAD_ROOT")]
    root: Option<PathBuf>,
}

impl RevertLaunchArgs {
    pub(crate) fn run(self) -> eyre::Result<()> {
        let file = parse_launch_file(&self.launch_file)?;
        let root = self.root.unwrap_or_else(default_root);
        let runtime = CliRuntime::new(file.runtime_config(&root));

        let time = reset_genesis_time(&runtime.genesis_path())?;
        info!(target: "launchpad::cli", launch_id = %file.launch_id(), %time, "Launch reverted");
        println!("✔ Genesis time reset to {time}");
        Ok(())
    }
}
