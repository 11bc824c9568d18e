//! Launchpad Genesis Assembler
//!
//! Merges contributions from independent participants into one canonical
//! genesis document.
//!
//! ```text
//! Assembly (strict order, all or nothing):
//! ├── 1. re-encode every address to the chain prefix
//! ├── snapshot genesis
//! ├── 2. genesis accounts      (add-genesis-account)
//! ├── 3. vesting accounts      (add-genesis-account --vesting-*)
//! ├── 4. validators            (gentx{i}.json + collect-gentxs)
//! └── 5. genesis time          (launch time, or now on reset)
//!        any failure or cancellation ──► restore snapshot
//! ```
//!
//! The same contributions, prefix and time always yield a byte-identical
//! document.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

pub mod address;
pub mod builder;
pub mod config;
pub mod snapshot;
pub mod time;

pub use address::change_address_prefix;
pub use builder::GenesisAssembler;
pub use config::{GenesisAccount, GenesisInformation, GenesisValidator, VestingAccount};
pub use snapshot::GenesisSnapshot;
pub use time::{GenesisTime, reset_genesis_time, set_genesis_time};

use launchpad_runtime::RuntimeError;
use std::path::PathBuf;
use thiserror::Error;

/// Genesis assembly errors
#[derive(Debug, Error)]
pub enum GenesisError {
    /// An address is not valid bech32 or cannot take the target prefix
    #[error("invalid address {address}: {reason}")]
    AddressFormat {
        /// Offending address
        address: String,
        /// Decoder or encoder complaint
        reason: String,
    },

    /// Applying a genesis account failed
    #[error("error applying genesis accounts to genesis: {0}")]
    Accounts(#[source] RuntimeError),

    /// Applying a vesting account failed
    #[error("error applying vesting accounts to genesis: {0}")]
    Vesting(#[source] RuntimeError),

    /// Collecting validator join transactions failed
    #[error("error applying genesis validators to genesis: {0}")]
    Validators(#[source] RuntimeError),

    /// A join transaction could not be written
    #[error("error applying genesis validators to genesis: cannot write {}: {source}", path.display())]
    GentxWrite {
        /// Gentx file or directory
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// The genesis time could not be written
    #[error("genesis time can't be set: {0}")]
    GenesisTime(#[source] std::io::Error),

    /// The genesis document could not be read or parsed
    #[error("genesis of the blockchain can't be read: {}: {source}", path.display())]
    Document {
        /// Genesis path
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// Assembly observed cancellation
    #[error("genesis assembly cancelled")]
    Cancelled,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
