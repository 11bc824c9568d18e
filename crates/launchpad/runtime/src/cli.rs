//! Process-backed runtime driving a Cosmos-SDK style daemon.

use crate::{ChainRuntime, RuntimeError};
use async_trait::async_trait;
use std::{
    ffi::OsStr,
    io::ErrorKind,
    path::{Path, PathBuf},
    process::Stdio,
};
use tokio::process::Command;
use tracing::{debug, info};

/// Default build invocation, run from the source root
const DEFAULT_BUILD_COMMAND: [&str; 5] = ["go", "build", "-o", "{bin_dir}/{binary}", "./cmd/{binary}"];

/// How to build and drive one chain's daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Chain id passed to `init`
    pub chain_id: String,
    /// Node moniker passed to `init`
    pub moniker: String,
    /// Daemon binary file name
    pub binary_name: String,
    /// Directory the build installs the binary into
    pub bin_dir: PathBuf,
    /// Chain home directory
    pub home: PathBuf,
    /// Build argv. `{bin_dir}` and `{binary}` are substituted.
    pub build_command: Vec<String>,
    /// Keyring backend forwarded to account commands
    pub keyring_backend: Option<String>,
}

impl RuntimeConfig {
    /// Config with the default moniker and build command
    pub fn new(
        chain_id: impl Into<String>,
        binary_name: impl Into<String>,
        home: impl Into<PathBuf>,
        bin_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            chain_id: chain_id.into(),
            moniker: "launchpad".to_owned(),
            binary_name: binary_name.into(),
            bin_dir: bin_dir.into(),
            home: home.into(),
            build_command: DEFAULT_BUILD_COMMAND.iter().map(|arg| (*arg).to_owned()).collect(),
            keyring_backend: None,
        }
    }

    /// Set the node moniker
    pub fn with_moniker(mut self, moniker: impl Into<String>) -> Self {
        self.moniker = moniker.into();
        self
    }

    /// Set the build argv
    pub fn with_build_command(mut self, command: Vec<String>) -> Self {
        self.build_command = command;
        self
    }

    /// Set the keyring backend
    pub fn with_keyring_backend(mut self, backend: impl Into<String>) -> Self {
        self.keyring_backend = Some(backend.into());
        self
    }
}

/// [`ChainRuntime`] running the daemon as child processes.
///
/// Children are killed when the awaiting future is dropped.
#[derive(Debug, Clone)]
pub struct CliRuntime {
    config: RuntimeConfig,
}

impl CliRuntime {
    /// Create a runtime for `config`
    pub const fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    /// The runtime's configuration
    pub const fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Run the daemon with `args` against `home`, returning stdout
    async fn daemon_in<I, S>(&self, home: &Path, args: I) -> Result<String, RuntimeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let binary = self.binary();
        if !binary.exists() {
            return Err(RuntimeError::MissingBinary(binary));
        }

        let mut command = Command::new(&binary);
        command.args(args).arg("--home").arg(home);
        run(&mut command).await
    }

    async fn daemon<I, S>(&self, args: I) -> Result<String, RuntimeError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.daemon_in(&self.config.home, args).await
    }

    /// Account commands honour the configured keyring backend
    fn with_keyring(&self, mut args: Vec<String>) -> Vec<String> {
        if let Some(backend) = &self.config.keyring_backend {
            args.push("--keyring-backend".to_owned());
            args.push(backend.clone());
        }
        args
    }

    fn expand(&self, arg: &str) -> String {
        arg.replace("{bin_dir}", &self.config.bin_dir.display().to_string())
            .replace("{binary}", &self.config.binary_name)
    }
}

#[async_trait]
impl ChainRuntime for CliRuntime {
    async fn build(&self, source: &Path) -> Result<PathBuf, RuntimeError> {
        let argv: Vec<String> = self.config.build_command.iter().map(|arg| self.expand(arg)).collect();
        let Some((program, args)) = argv.split_first() else {
            return Err(RuntimeError::Spawn {
                command: String::new(),
                source: std::io::Error::new(ErrorKind::InvalidInput, "empty build command"),
            });
        };

        info!(target: "launchpad::runtime", source = %source.display(), binary = %self.config.binary_name, "Building the blockchain");
        tokio::fs::create_dir_all(&self.config.bin_dir).await?;

        let mut command = Command::new(program);
        command.args(args).current_dir(source);
        run(&mut command).await?;

        let binary = self.binary();
        if !binary.exists() {
            return Err(RuntimeError::MissingBinary(binary));
        }
        Ok(binary)
    }

    fn binary(&self) -> PathBuf {
        self.config.bin_dir.join(&self.config.binary_name)
    }

    fn home(&self) -> &Path {
        &self.config.home
    }

    async fn init_validator(&self) -> Result<(), RuntimeError> {
        self.daemon(["init", self.config.moniker.as_str(), "--chain-id", self.config.chain_id.as_str()]).await?;
        Ok(())
    }

    async fn init_genesis(&self) -> Result<(), RuntimeError> {
        // init refuses to touch an existing key, so derive defaults in a scratch home
        let scratch = tempfile::Builder::new().prefix("launchpad-init-").tempdir()?;
        self.daemon_in(
            scratch.path(),
            ["init", self.config.moniker.as_str(), "--chain-id", self.config.chain_id.as_str()],
        )
        .await?;

        let genesis = self.genesis_path();
        if let Some(dir) = genesis.parent() {
            tokio::fs::create_dir_all(dir).await?;
        }
        tokio::fs::copy(scratch.path().join("config").join("genesis.json"), &genesis).await?;
        Ok(())
    }

    async fn add_genesis_account(&self, address: &str, coins: &str) -> Result<(), RuntimeError> {
        let args = self.with_keyring(vec![
            "add-genesis-account".to_owned(),
            address.to_owned(),
            coins.to_owned(),
        ]);
        self.daemon(args).await?;
        Ok(())
    }

    async fn add_vesting_account(
        &self,
        address: &str,
        total_balance: &str,
        vesting: &str,
        end_time: i64,
    ) -> Result<(), RuntimeError> {
        let args = self.with_keyring(vec![
            "add-genesis-account".to_owned(),
            address.to_owned(),
            total_balance.to_owned(),
            "--vesting-amount".to_owned(),
            vesting.to_owned(),
            "--vesting-end-time".to_owned(),
            end_time.to_string(),
        ]);
        self.daemon(args).await?;
        Ok(())
    }

    async fn collect_gentxs(&self) -> Result<(), RuntimeError> {
        self.daemon(["collect-gentxs"]).await?;
        Ok(())
    }

    async fn validate_genesis(&self) -> Result<(), RuntimeError> {
        self.daemon(["validate-genesis"]).await?;
        Ok(())
    }

    async fn unsafe_reset_state(&self) -> Result<(), RuntimeError> {
        self.daemon(["unsafe-reset-all"]).await?;
        Ok(())
    }

    async fn node_id(&self) -> Result<String, RuntimeError> {
        let stdout = self.daemon(["tendermint", "show-node-id"]).await?;
        Ok(stdout.trim().to_owned())
    }
}

async fn run(command: &mut Command) -> Result<String, RuntimeError> {
    let line = command_line(command);
    debug!(target: "launchpad::runtime", command = %line, "Running");

    let output = command
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|source| RuntimeError::Spawn { command: line.clone(), source })?;

    if !output.status.success() {
        return Err(RuntimeError::Command {
            command: line,
            code: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn command_line(command: &Command) -> String {
    let inner = command.as_std();
    std::iter::once(inner.get_program())
        .chain(inner.get_args())
        .map(|part| part.to_string_lossy())
        .collect::<Vec<_>>()
        .join(" ")
}
