//! Genesis time

use crate::GenesisError;
use chrono::{DateTime, SecondsFormat, Utc};
use launchpad_fs_util::write_atomic;
use serde_json::Value;
use std::{io, path::Path};
use tracing::info;

/// When the chain starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenesisTime {
    /// The launch's scheduled time
    Launch(DateTime<Utc>),
    /// The moment the time is written, used when a launch is reverted
    Now,
}

impl GenesisTime {
    /// The concrete timestamp
    pub fn resolve(self) -> DateTime<Utc> {
        match self {
            Self::Launch(time) => time,
            Self::Now => Utc::now(),
        }
    }
}

impl From<Option<DateTime<Utc>>> for GenesisTime {
    fn from(launch_time: Option<DateTime<Utc>>) -> Self {
        launch_time.map_or(Self::Now, Self::Launch)
    }
}

/// Set `genesis_time` in the genesis document at `path`, returning the time
/// written. Every other field keeps its value and position.
pub fn set_genesis_time(path: &Path, time: GenesisTime) -> Result<DateTime<Utc>, GenesisError> {
    let unreadable = |source: io::Error| GenesisError::Document { path: path.to_path_buf(), source };

    let data = std::fs::read(path).map_err(unreadable)?;
    let mut genesis: Value = serde_json::from_slice(&data).map_err(|err| unreadable(err.into()))?;
    let Some(document) = genesis.as_object_mut() else {
        return Err(unreadable(io::Error::new(io::ErrorKind::InvalidData, "not a JSON object")));
    };

    let time = time.resolve();
    document.insert(
        "genesis_time".to_owned(),
        Value::String(time.to_rfc3339_opts(SecondsFormat::AutoSi, true)),
    );

    let data = serde_json::to_vec_pretty(&genesis).map_err(|err| GenesisError::GenesisTime(err.into()))?;
    write_atomic(path, &data).map_err(GenesisError::GenesisTime)?;

    info!(target: "launchpad::genesis", %time, "Genesis time set");
    Ok(time)
}

/// Move the genesis time to now, used when a launch is reverted
pub fn reset_genesis_time(path: &Path) -> Result<DateTime<Utc>, GenesisError> {
    set_genesis_time(path, GenesisTime::Now)
}
