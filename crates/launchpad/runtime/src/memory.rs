//! In-process [`ChainRuntime`] for tests.
//!
//! Keeps a small JSON genesis on disk under the home directory so the
//! assembler and peer configurator operate on real files, and records every
//! call for assertions.

use crate::{ChainRuntime, RuntimeError};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::{
    collections::HashSet,
    fmt,
    io::ErrorKind,
    path::{Path, PathBuf},
    sync::atomic::{AtomicU64, Ordering},
};

/// Keys are unique per process so re-initialisation is observable
static NEXT_KEY: AtomicU64 = AtomicU64::new(1);

/// Default node configuration written by `init_validator`
const DEFAULT_CONFIG: &str = r#"# node configuration
moniker = "memory"

[p2p]
laddr = "tcp://0.0.0.0:26656"
persistent_peers = ""
allow_duplicate_ip = false
"#;

/// A runtime operation, for failure injection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuntimeStep {
    /// [`ChainRuntime::build`]
    Build,
    /// [`ChainRuntime::init_validator`]
    InitValidator,
    /// [`ChainRuntime::init_genesis`]
    InitGenesis,
    /// [`ChainRuntime::add_genesis_account`]
    AddGenesisAccount,
    /// [`ChainRuntime::add_vesting_account`]
    AddVestingAccount,
    /// [`ChainRuntime::collect_gentxs`]
    CollectGentxs,
    /// [`ChainRuntime::validate_genesis`]
    ValidateGenesis,
    /// [`ChainRuntime::unsafe_reset_state`]
    UnsafeResetState,
    /// [`ChainRuntime::node_id`]
    NodeId,
}

/// A recorded runtime call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuntimeCall {
    /// Built from this source tree
    Build(PathBuf),
    /// Validator initialised
    InitValidator,
    /// Genesis reset to defaults
    InitGenesis,
    /// Account added
    AddGenesisAccount {
        /// Account address
        address: String,
        /// Coins
        coins: String,
    },
    /// Vesting account added
    AddVestingAccount {
        /// Account address
        address: String,
        /// Total balance
        total_balance: String,
        /// Vesting amount
        vesting: String,
        /// Vesting end, unix seconds
        end_time: i64,
    },
    /// Join transactions collected
    CollectGentxs,
    /// Genesis validated
    ValidateGenesis,
    /// State reset
    UnsafeResetState,
    /// Node id queried
    NodeId,
}

impl RuntimeCall {
    /// The operation this call exercised
    pub const fn step(&self) -> RuntimeStep {
        match self {
            Self::Build(_) => RuntimeStep::Build,
            Self::InitValidator => RuntimeStep::InitValidator,
            Self::InitGenesis => RuntimeStep::InitGenesis,
            Self::AddGenesisAccount { .. } => RuntimeStep::AddGenesisAccount,
            Self::AddVestingAccount { .. } => RuntimeStep::AddVestingAccount,
            Self::CollectGentxs => RuntimeStep::CollectGentxs,
            Self::ValidateGenesis => RuntimeStep::ValidateGenesis,
            Self::UnsafeResetState => RuntimeStep::UnsafeResetState,
            Self::NodeId => RuntimeStep::NodeId,
        }
    }
}

/// In-process chain runtime.
///
/// Genesis layout: `{genesis_time, chain_id, app_state: {accounts,
/// vesting_accounts, gentxs}}`. Duplicate account addresses are rejected the
/// way a real daemon rejects them.
pub struct MemoryRuntime {
    chain_id: String,
    home: PathBuf,
    bin_dir: PathBuf,
    binary_name: String,
    calls: Mutex<Vec<RuntimeCall>>,
    failures: Mutex<HashSet<RuntimeStep>>,
    hooks: Mutex<Vec<(RuntimeStep, Hook)>>,
}

type Hook = Box<dyn Fn() + Send + Sync>;

impl fmt::Debug for MemoryRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRuntime")
            .field("chain_id", &self.chain_id)
            .field("home", &self.home)
            .field("bin_dir", &self.bin_dir)
            .field("calls", &self.calls.lock().len())
            .finish_non_exhaustive()
    }
}

impl MemoryRuntime {
    /// Runtime for `chain_id` with its home at `home` and binary in `bin_dir`
    pub fn new(chain_id: impl Into<String>, home: impl Into<PathBuf>, bin_dir: impl Into<PathBuf>) -> Self {
        Self {
            chain_id: chain_id.into(),
            home: home.into(),
            bin_dir: bin_dir.into(),
            binary_name: "memoryd".to_owned(),
            calls: Mutex::new(Vec::new()),
            failures: Mutex::new(HashSet::new()),
            hooks: Mutex::new(Vec::new()),
        }
    }

    /// Run `hook` every time `step` is called, after the call is recorded
    pub fn on_call(&self, step: RuntimeStep, hook: impl Fn() + Send + Sync + 'static) {
        self.hooks.lock().push((step, Box::new(hook)));
    }

    /// Make every later call of `step` fail
    pub fn fail_on(&self, step: RuntimeStep) {
        self.failures.lock().insert(step);
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<RuntimeCall> {
        self.calls.lock().clone()
    }

    /// The steps called so far, in order
    pub fn steps(&self) -> Vec<RuntimeStep> {
        self.calls.lock().iter().map(RuntimeCall::step).collect()
    }

    /// Forget recorded calls
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: RuntimeCall) -> Result<(), RuntimeError> {
        let step = call.step();
        self.calls.lock().push(call);
        for (_, hook) in self.hooks.lock().iter().filter(|(hooked, _)| *hooked == step) {
            hook();
        }
        if self.failures.lock().contains(&step) {
            return Err(rejected(format!("{step:?}"), "injected failure"));
        }
        Ok(())
    }

    fn default_genesis(&self) -> Value {
        json!({
            "genesis_time": "1970-01-01T00:00:00Z",
            "chain_id": self.chain_id,
            "app_state": {
                "accounts": [],
                "vesting_accounts": [],
                "gentxs": [],
            },
        })
    }

    fn read_genesis(&self) -> Result<Value, RuntimeError> {
        let data = std::fs::read(self.genesis_path())?;
        let genesis = serde_json::from_slice(&data).map_err(std::io::Error::from)?;
        Ok(genesis)
    }

    fn write_genesis(&self, genesis: &Value) -> Result<(), RuntimeError> {
        let path = self.genesis_path();
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let data = serde_json::to_vec_pretty(genesis).map_err(std::io::Error::from)?;
        std::fs::write(path, data)?;
        Ok(())
    }

    fn add_account(&self, command: &str, address: &str, list: &str, entry: Value) -> Result<(), RuntimeError> {
        let mut genesis = self.read_genesis()?;
        let app_state = &mut genesis["app_state"];
        let exists = ["accounts", "vesting_accounts"].iter().any(|key| {
            app_state[*key]
                .as_array()
                .is_some_and(|accounts| accounts.iter().any(|account| account["address"] == address))
        });
        if exists {
            return Err(rejected(command, &format!("account {address} already exists")));
        }

        if !app_state[list].is_array() {
            app_state[list] = Value::Array(Vec::new());
        }
        if let Some(accounts) = app_state[list].as_array_mut() {
            accounts.push(entry);
        }
        self.write_genesis(&genesis)
    }

    fn priv_key_path(&self) -> PathBuf {
        self.home.join("config").join("priv_validator_key.json")
    }
}

/// `7` for `gentx7.json`
fn gentx_index(file: &Path) -> Option<u64> {
    file.file_stem()?.to_str()?.strip_prefix("gentx")?.parse().ok()
}

fn rejected(command: impl Into<String>, reason: &str) -> RuntimeError {
    RuntimeError::Command { command: command.into(), code: Some(1), stderr: reason.to_owned() }
}

#[async_trait]
impl ChainRuntime for MemoryRuntime {
    async fn build(&self, source: &Path) -> Result<PathBuf, RuntimeError> {
        self.record(RuntimeCall::Build(source.to_path_buf()))?;
        std::fs::create_dir_all(&self.bin_dir)?;
        let binary = self.binary();
        std::fs::write(&binary, format!("memoryd for {} from {}\n", self.chain_id, source.display()))?;
        Ok(binary)
    }

    fn binary(&self) -> PathBuf {
        self.bin_dir.join(&self.binary_name)
    }

    fn home(&self) -> &Path {
        &self.home
    }

    async fn init_validator(&self) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::InitValidator)?;
        let config_dir = self.home.join("config");
        std::fs::create_dir_all(&config_dir)?;

        let key = NEXT_KEY.fetch_add(1, Ordering::Relaxed);
        let node_id = format!("{key:040x}");
        std::fs::write(self.priv_key_path(), json!({ "node_id": node_id }).to_string())?;
        std::fs::write(self.config_path(), DEFAULT_CONFIG)?;
        self.write_genesis(&self.default_genesis())
    }

    async fn init_genesis(&self) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::InitGenesis)?;
        self.write_genesis(&self.default_genesis())
    }

    async fn add_genesis_account(&self, address: &str, coins: &str) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::AddGenesisAccount {
            address: address.to_owned(),
            coins: coins.to_owned(),
        })?;
        self.add_account(
            "add-genesis-account",
            address,
            "accounts",
            json!({ "address": address, "coins": coins }),
        )
    }

    async fn add_vesting_account(
        &self,
        address: &str,
        total_balance: &str,
        vesting: &str,
        end_time: i64,
    ) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::AddVestingAccount {
            address: address.to_owned(),
            total_balance: total_balance.to_owned(),
            vesting: vesting.to_owned(),
            end_time,
        })?;
        self.add_account(
            "add-genesis-account",
            address,
            "vesting_accounts",
            json!({
                "address": address,
                "coins": total_balance,
                "vesting": vesting,
                "end_time": end_time,
            }),
        )
    }

    async fn collect_gentxs(&self) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::CollectGentxs)?;

        let mut files: Vec<PathBuf> = std::fs::read_dir(self.gentxs_path())?
            .map(|entry| entry.map(|entry| entry.path()))
            .collect::<Result<_, _>>()?;
        // gentx2 before gentx10
        files.sort_by_key(|file| (gentx_index(file), file.clone()));

        let mut gentxs = Vec::with_capacity(files.len());
        for file in files {
            let gentx: Value = serde_json::from_slice(&std::fs::read(&file)?)
                .map_err(|_| rejected("collect-gentxs", &format!("invalid gentx {}", file.display())))?;
            gentxs.push(gentx);
        }

        let mut genesis = self.read_genesis()?;
        genesis["app_state"]["gentxs"] = Value::Array(gentxs);
        self.write_genesis(&genesis)
    }

    async fn validate_genesis(&self) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::ValidateGenesis)?;
        let genesis = self.read_genesis()?;
        if genesis["chain_id"] != self.chain_id.as_str() {
            return Err(rejected("validate-genesis", "chain id mismatch"));
        }
        if !genesis["genesis_time"].is_string() {
            return Err(rejected("validate-genesis", "missing genesis time"));
        }
        Ok(())
    }

    async fn unsafe_reset_state(&self) -> Result<(), RuntimeError> {
        self.record(RuntimeCall::UnsafeResetState)?;
        let data = self.home.join("data");
        match std::fs::remove_dir_all(&data) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
        std::fs::create_dir_all(data)?;
        Ok(())
    }

    async fn node_id(&self) -> Result<String, RuntimeError> {
        self.record(RuntimeCall::NodeId)?;
        let key: Value = serde_json::from_slice(&std::fs::read(self.priv_key_path())?)
            .map_err(std::io::Error::from)?;
        key["node_id"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| rejected("tendermint show-node-id", "malformed validator key"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn runtime() -> (tempfile::TempDir, MemoryRuntime) {
        let dir = tempfile::tempdir().unwrap();
        let runtime = MemoryRuntime::new("orbit-1", dir.path().join("home"), dir.path().join("bin"));
        (dir, runtime)
    }

    #[tokio::test]
    async fn duplicate_accounts_are_rejected() {
        let (_dir, runtime) = runtime();
        runtime.init_validator().await.unwrap();
        runtime.add_genesis_account("cosmos1abc", "10stake").await.unwrap();

        assert_matches!(
            runtime.add_vesting_account("cosmos1abc", "10stake", "5stake", 100).await,
            Err(RuntimeError::Command { stderr, .. }) if stderr.contains("already exists")
        );
    }

    #[tokio::test]
    async fn reinitialising_creates_a_new_key() {
        let (_dir, runtime) = runtime();
        runtime.init_validator().await.unwrap();
        let first = runtime.node_id().await.unwrap();

        runtime.init_genesis().await.unwrap();
        assert_eq!(runtime.node_id().await.unwrap(), first);

        runtime.init_validator().await.unwrap();
        assert_ne!(runtime.node_id().await.unwrap(), first);
    }

    #[tokio::test]
    async fn injected_failure_is_recorded() {
        let (_dir, runtime) = runtime();
        runtime.fail_on(RuntimeStep::ValidateGenesis);
        runtime.init_validator().await.unwrap();

        assert_matches!(runtime.validate_genesis().await, Err(RuntimeError::Command { .. }));
        assert_eq!(runtime.steps(), vec![RuntimeStep::InitValidator, RuntimeStep::ValidateGenesis]);
    }

    #[tokio::test]
    async fn gentxs_are_collected_in_index_order() {
        let (_dir, runtime) = runtime();
        runtime.init_validator().await.unwrap();
        std::fs::create_dir_all(runtime.gentxs_path()).unwrap();
        for index in 0..12 {
            let gentx = json!({ "memo": format!("V{index}") }).to_string();
            std::fs::write(runtime.gentxs_path().join(format!("gentx{index}.json")), gentx).unwrap();
        }

        runtime.collect_gentxs().await.unwrap();
        let genesis = runtime.read_genesis().unwrap();
        let memos: Vec<_> = genesis["app_state"]["gentxs"]
            .as_array()
            .unwrap()
            .iter()
            .map(|gentx| gentx["memo"].as_str().unwrap().to_owned())
            .collect();
        assert_eq!(memos, (0..12).map(|index| format!("V{index}")).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn hooks_run_on_their_step() {
        let (_dir, runtime) = runtime();
        let seen = std::sync::Arc::new(AtomicU64::new(0));
        let counter = std::sync::Arc::clone(&seen);
        runtime.on_call(RuntimeStep::InitGenesis, move || {
            counter.fetch_add(1, Ordering::Relaxed);
        });

        runtime.init_validator().await.unwrap();
        runtime.init_genesis().await.unwrap();
        runtime.init_genesis().await.unwrap();
        assert_eq!(seen.load(Ordering::Relaxed), 2);
    }
}
