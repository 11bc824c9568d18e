//! Genesis assembler

use crate::{
    GenesisAccount, GenesisError, GenesisInformation, GenesisSnapshot, GenesisTime,
    VestingAccount, change_address_prefix, set_genesis_time,
};
use chrono::{DateTime, Utc};
use launchpad_runtime::{ChainRuntime, RuntimeError};
use std::{future::Future, io::ErrorKind};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Applies [`GenesisInformation`] to a chain's genesis through its runtime
#[derive(Debug)]
pub struct GenesisAssembler<'a, R: ?Sized> {
    runtime: &'a R,
    cancel: CancellationToken,
}

impl<'a, R: ChainRuntime + ?Sized> GenesisAssembler<'a, R> {
    /// Create an assembler over `runtime`
    pub fn new(runtime: &'a R) -> Self {
        Self { runtime, cancel: CancellationToken::new() }
    }

    /// Give up with [`GenesisError::Cancelled`] once `cancel` fires. A runtime
    /// step in flight is dropped, which kills its child process.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Apply every contribution, re-encoded to `prefix`, then set the genesis
    /// time. Returns the genesis time written.
    ///
    /// Addresses are checked before anything is applied. If a later step
    /// fails or assembly is cancelled, the genesis document is restored to
    /// its prior bytes.
    pub async fn build(
        &self,
        info: &GenesisInformation,
        prefix: &str,
        time: GenesisTime,
    ) -> Result<DateTime<Utc>, GenesisError> {
        let accounts = info
            .accounts
            .iter()
            .map(|account| Ok((change_address_prefix(&account.address, prefix)?, account)))
            .collect::<Result<Vec<_>, GenesisError>>()?;
        let vesting_accounts = info
            .vesting_accounts
            .iter()
            .map(|account| Ok((change_address_prefix(&account.address, prefix)?, account)))
            .collect::<Result<Vec<_>, GenesisError>>()?;

        info!(
            target: "launchpad::genesis",
            accounts = accounts.len(),
            vesting_accounts = vesting_accounts.len(),
            validators = info.validators.len(),
            %prefix,
            "Building the genesis"
        );

        let snapshot = GenesisSnapshot::capture(&self.runtime.genesis_path())?;

        let result = self.apply(&accounts, &vesting_accounts, info, time).await;

        match result {
            Ok(time) => {
                info!(target: "launchpad::genesis", %time, "Genesis built");
                Ok(time)
            }
            Err(err) => {
                if let Err(restore) = snapshot.restore() {
                    error!(target: "launchpad::genesis", %restore, "Failed to restore genesis snapshot");
                }
                Err(err)
            }
        }
    }

    async fn apply(
        &self,
        accounts: &[(String, &GenesisAccount)],
        vesting_accounts: &[(String, &VestingAccount)],
        info: &GenesisInformation,
        time: GenesisTime,
    ) -> Result<DateTime<Utc>, GenesisError> {
        for (address, account) in accounts {
            debug!(target: "launchpad::genesis", %address, coins = %account.coins, "Adding genesis account");
            self.run_step(self.runtime.add_genesis_account(address, &account.coins), GenesisError::Accounts)
                .await?;
        }

        for (address, account) in vesting_accounts {
            debug!(target: "launchpad::genesis", %address, end_time = account.end_time, "Adding vesting account");
            self.run_step(
                self.runtime.add_vesting_account(address, &account.total_balance, &account.vesting, account.end_time),
                GenesisError::Vesting,
            )
            .await?;
        }

        self.apply_validators(info).await?;

        if self.cancel.is_cancelled() {
            return Err(GenesisError::Cancelled);
        }
        set_genesis_time(&self.runtime.genesis_path(), time)
    }

    /// Write `gentx{i}.json` for every validator in order, then collect them.
    /// A launch without validators leaves the gentx directory alone.
    async fn apply_validators(&self, info: &GenesisInformation) -> Result<(), GenesisError> {
        if info.validators.is_empty() {
            return Ok(());
        }
        if self.cancel.is_cancelled() {
            return Err(GenesisError::Cancelled);
        }

        let dir = self.runtime.gentxs_path();
        let write_error = |path: &std::path::Path, source| GenesisError::GentxWrite {
            path: path.to_path_buf(),
            source,
        };

        match std::fs::remove_dir_all(&dir) {
            Err(err) if err.kind() != ErrorKind::NotFound => return Err(write_error(&dir, err)),
            _ => {}
        }
        create_private_dir(&dir).map_err(|err| write_error(&dir, err))?;

        for (index, validator) in info.validators.iter().enumerate() {
            let path = dir.join(format!("gentx{index}.json"));
            std::fs::write(&path, &validator.gentx).map_err(|err| write_error(&path, err))?;
        }

        debug!(target: "launchpad::genesis", gentxs = info.validators.len(), dir = %dir.display(), "Collecting gentxs");
        self.run_step(self.runtime.collect_gentxs(), GenesisError::Validators).await
    }

    async fn run_step<T>(
        &self,
        step: impl Future<Output = Result<T, RuntimeError>>,
        wrap: fn(RuntimeError) -> GenesisError,
    ) -> Result<T, GenesisError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(GenesisError::Cancelled),
            result = step => result.map_err(wrap),
        }
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &std::path::Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;
    std::fs::DirBuilder::new().recursive(true).mode(0o700).create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &std::path::Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GenesisValidator;
    use assert_matches::assert_matches;
    use bech32::{Bech32, Hrp};
    use chrono::TimeZone;
    use launchpad_peers::PeerDescriptor;
    use launchpad_runtime::{MemoryRuntime, RuntimeCall, RuntimeStep};
    use serde_json::Value;
    use tempfile::TempDir;

    fn address(prefix: &str, seed: u8) -> String {
        bech32::encode::<Bech32>(Hrp::parse(prefix).unwrap(), &[seed; 20]).unwrap()
    }

    fn launch_time() -> GenesisTime {
        GenesisTime::Launch(Utc.with_ymd_and_hms(2026, 1, 15, 9, 0, 0).unwrap())
    }

    fn contributions() -> GenesisInformation {
        GenesisInformation::new()
            .with_account(GenesisAccount::new(address("cosmos", 1), "1000stake"))
            .with_account(GenesisAccount::new(address("osmo", 2), "500stake"))
            .with_vesting_account(VestingAccount::new(address("cosmos", 3), "300stake", "200stake", 1_800_000_000))
            .with_validator(GenesisValidator::new(
                br#"{"memo":"V1"}"#.to_vec(),
                PeerDescriptor::tcp("V1", "1.2.3.4:26656"),
            ))
            .with_validator(GenesisValidator::new(
                br#"{"memo":"V2"}"#.to_vec(),
                PeerDescriptor::tunnel("V2", "relayA", "https://relay"),
            ))
    }

    async fn initialised() -> (TempDir, MemoryRuntime) {
        let dir = tempfile::tempdir().unwrap();
        let runtime = MemoryRuntime::new("orbit-1", dir.path().join("home"), dir.path().join("bin"));
        runtime.init_validator().await.unwrap();
        runtime.clear_calls();
        (dir, runtime)
    }

    fn genesis(runtime: &MemoryRuntime) -> Value {
        serde_json::from_slice(&std::fs::read(runtime.genesis_path()).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn applies_contributions_in_order() {
        let (_dir, runtime) = initialised().await;

        let time = GenesisAssembler::new(&runtime).build(&contributions(), "spn", launch_time()).await.unwrap();
        assert_eq!(GenesisTime::Launch(time), launch_time());

        assert_eq!(
            runtime.calls(),
            vec![
                RuntimeCall::AddGenesisAccount { address: address("spn", 1), coins: "1000stake".into() },
                RuntimeCall::AddGenesisAccount { address: address("spn", 2), coins: "500stake".into() },
                RuntimeCall::AddVestingAccount {
                    address: address("spn", 3),
                    total_balance: "300stake".into(),
                    vesting: "200stake".into(),
                    end_time: 1_800_000_000,
                },
                RuntimeCall::CollectGentxs,
            ]
        );

        let gentxs = runtime.gentxs_path();
        assert_eq!(std::fs::read(gentxs.join("gentx0.json")).unwrap(), br#"{"memo":"V1"}"#);
        assert_eq!(std::fs::read(gentxs.join("gentx1.json")).unwrap(), br#"{"memo":"V2"}"#);

        let genesis = genesis(&runtime);
        assert_eq!(genesis["genesis_time"], "2026-01-15T09:00:00Z");
        assert_eq!(genesis["app_state"]["gentxs"][1]["memo"], "V2");
    }

    #[tokio::test]
    async fn same_inputs_give_identical_genesis() {
        let (_dir, runtime) = initialised().await;
        let assembler = GenesisAssembler::new(&runtime);

        assembler.build(&contributions(), "spn", launch_time()).await.unwrap();
        let first = std::fs::read(runtime.genesis_path()).unwrap();

        runtime.init_genesis().await.unwrap();
        assembler.build(&contributions(), "spn", launch_time()).await.unwrap();
        assert_eq!(std::fs::read(runtime.genesis_path()).unwrap(), first);
    }

    #[tokio::test]
    async fn bad_address_fails_before_any_mutation() {
        let (_dir, runtime) = initialised().await;
        let before = std::fs::read(runtime.genesis_path()).unwrap();

        let info = contributions().with_vesting_account(VestingAccount::new("cosmos1broken", "1stake", "1stake", 0));
        assert_matches!(
            GenesisAssembler::new(&runtime).build(&info, "spn", launch_time()).await,
            Err(GenesisError::AddressFormat { address, .. }) if address == "cosmos1broken"
        );
        assert!(runtime.calls().is_empty());
        assert_eq!(std::fs::read(runtime.genesis_path()).unwrap(), before);
    }

    #[tokio::test]
    async fn duplicate_account_restores_genesis() {
        let (_dir, runtime) = initialised().await;
        let before = std::fs::read(runtime.genesis_path()).unwrap();

        // same payload under another prefix collides after re-encoding
        let info = contributions().with_account(GenesisAccount::new(address("juno", 1), "1stake"));
        let err = GenesisAssembler::new(&runtime).build(&info, "spn", launch_time()).await.unwrap_err();

        assert_matches!(err, GenesisError::Accounts(_));
        assert!(err.to_string().starts_with("error applying genesis accounts to genesis"));
        assert_eq!(std::fs::read(runtime.genesis_path()).unwrap(), before);
        assert!(!runtime.steps().contains(&RuntimeStep::AddVestingAccount));
    }

    #[tokio::test]
    async fn collect_failure_restores_genesis() {
        let (_dir, runtime) = initialised().await;
        runtime.fail_on(RuntimeStep::CollectGentxs);
        let before = std::fs::read(runtime.genesis_path()).unwrap();

        assert_matches!(
            GenesisAssembler::new(&runtime).build(&contributions(), "spn", launch_time()).await,
            Err(GenesisError::Validators(_))
        );
        assert_eq!(std::fs::read(runtime.genesis_path()).unwrap(), before);
    }

    #[tokio::test]
    async fn cancellation_mid_assembly_restores_genesis() {
        let (_dir, runtime) = initialised().await;
        let before = std::fs::read(runtime.genesis_path()).unwrap();
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        runtime.on_call(RuntimeStep::AddGenesisAccount, move || token.cancel());

        let info = (10..15).fold(contributions(), |info, seed| {
            info.with_account(GenesisAccount::new(address("cosmos", seed), "1stake"))
        });
        assert_matches!(
            GenesisAssembler::new(&runtime).with_cancel(cancel).build(&info, "spn", launch_time()).await,
            Err(GenesisError::Cancelled)
        );

        // the first account was in flight when cancellation fired; nothing ran after it
        assert_eq!(runtime.steps(), vec![RuntimeStep::AddGenesisAccount]);
        assert_eq!(std::fs::read(runtime.genesis_path()).unwrap(), before);
        assert!(!runtime.gentxs_path().exists());
    }

    #[tokio::test]
    async fn no_validators_skips_gentx_collection() {
        let (_dir, runtime) = initialised().await;
        let stale = runtime.gentxs_path().join("gentx0.json");
        std::fs::create_dir_all(runtime.gentxs_path()).unwrap();
        std::fs::write(&stale, "{}").unwrap();

        let info = GenesisInformation::new().with_account(GenesisAccount::new(address("cosmos", 4), "1stake"));
        GenesisAssembler::new(&runtime).build(&info, "spn", launch_time()).await.unwrap();

        assert_eq!(runtime.steps(), vec![RuntimeStep::AddGenesisAccount]);
        assert!(stale.exists());
    }

    #[tokio::test]
    async fn gentx_directory_is_replaced() {
        let (_dir, runtime) = initialised().await;
        let stale = runtime.gentxs_path().join("gentx7.json");
        std::fs::create_dir_all(runtime.gentxs_path()).unwrap();
        std::fs::write(&stale, "{}").unwrap();

        GenesisAssembler::new(&runtime).build(&contributions(), "spn", launch_time()).await.unwrap();
        assert!(!stale.exists());
        assert_eq!(genesis(&runtime)["app_state"]["gentxs"].as_array().unwrap().len(), 2);
    }
}
