//! Launchpad Binary
//!
//! Prepares a chain home for a coordinated genesis launch.

#![allow(missing_docs)]

mod fetch;
mod prepare;
mod revert;

use clap::{Parser, Subcommand};
use launchpad_prepare::EventBus;
use launchpad_source::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "launchpad", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Fetch, build and prepare a chain home for a launch
    Prepare(prepare::PrepareArgs),
    /// Move a prepared genesis time to now after a launch was reverted
    RevertLaunch(revert::RevertLaunchArgs),
    /// Fetch a source repository into a kept directory
    Fetch(fetch::FetchArgs),
}

#[tokio::main]
async fn main() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();
    let cancel = cancel_on_ctrl_c();

    let result = match cli.command {
        Commands::Prepare(args) => args.run(cancel).await,
        Commands::RevertLaunch(args) => args.run(),
        Commands::Fetch(args) => args.run(cancel).await,
    };

    if let Err(err) = result {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

/// Token cancelled by the first Ctrl-C
fn cancel_on_ctrl_c() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!(target: "launchpad::cli", "Interrupted, cancelling");
                token.cancel();
            }
            Err(err) => warn!(target: "launchpad::cli", %err, "Cannot listen for Ctrl-C"),
        }
    });
    cancel
}

/// Bus whose events are printed until every sender is gone
fn print_events() -> (EventBus, tokio::task::JoinHandle<()>) {
    let (events, mut rx) = EventBus::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            println!("{event}");
        }
    });
    (events, printer)
}
