//! Genesis contribution types

use launchpad_peers::PeerDescriptor;
use serde::{Deserialize, Serialize};

/// An account funded at genesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenesisAccount {
    /// Bech32 address, any prefix
    pub address: String,
    /// Coins, e.g. `1000stake,5token`
    pub coins: String,
}

impl GenesisAccount {
    /// Create a new account contribution
    pub fn new(address: impl Into<String>, coins: impl Into<String>) -> Self {
        Self { address: address.into(), coins: coins.into() }
    }
}

/// A delayed vesting account funded at genesis
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VestingAccount {
    /// Bech32 address, any prefix
    pub address: String,
    /// Total balance, vesting included
    pub total_balance: String,
    /// Amount locked until `end_time`
    pub vesting: String,
    /// Vesting end, unix seconds
    pub end_time: i64,
}

impl VestingAccount {
    /// Create a new vesting account contribution
    pub fn new(
        address: impl Into<String>,
        total_balance: impl Into<String>,
        vesting: impl Into<String>,
        end_time: i64,
    ) -> Self {
        Self {
            address: address.into(),
            total_balance: total_balance.into(),
            vesting: vesting.into(),
            end_time,
        }
    }
}

/// A validator joining at genesis
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenesisValidator {
    /// Signed join transaction, opaque to the assembler
    pub gentx: Vec<u8>,
    /// How to reach the validator's node
    pub peer: PeerDescriptor,
}

impl GenesisValidator {
    /// Create a new validator contribution
    pub fn new(gentx: impl Into<Vec<u8>>, peer: PeerDescriptor) -> Self {
        Self { gentx: gentx.into(), peer }
    }
}

/// Every contribution to a launch, in ledger order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenesisInformation {
    /// Genesis accounts
    pub accounts: Vec<GenesisAccount>,
    /// Vesting accounts
    pub vesting_accounts: Vec<VestingAccount>,
    /// Validators
    pub validators: Vec<GenesisValidator>,
}

impl GenesisInformation {
    /// Empty contribution set
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a genesis account
    pub fn with_account(mut self, account: GenesisAccount) -> Self {
        self.accounts.push(account);
        self
    }

    /// Add a vesting account
    pub fn with_vesting_account(mut self, account: VestingAccount) -> Self {
        self.vesting_accounts.push(account);
        self
    }

    /// Add a validator
    pub fn with_validator(mut self, validator: GenesisValidator) -> Self {
        self.validators.push(validator);
        self
    }

    /// The validators' peer descriptors, in validator order
    pub fn peers(&self) -> Vec<PeerDescriptor> {
        self.validators.iter().map(|validator| validator.peer.clone()).collect()
    }
}
