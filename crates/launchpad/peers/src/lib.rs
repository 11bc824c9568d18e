//! Launchpad Peer Network Configuration
//!
//! Reconciles the two ways a validator can be reached into one node
//! configuration:
//!
//! ```text
//! validator i ── TcpAddress "host:port" ──────► "id@host:port"
//!             └─ HttpTunnel {name, address} ──► "id@127.0.0.1:<base + i>"
//!                                               + LocalTunnelBinding for the relay client
//! ```
//!
//! Derivation is pure ([`PeerNetworkConfigurator::configure`]) and validates
//! every descriptor before anything is produced. Writing the result to disk
//! is a separate step ([`apply_node_config`], [`write_tunnel_record`]).

#![cfg_attr(not(test), warn(unused_crate_dependencies))]

mod configurator;
mod descriptor;
mod writer;

pub use configurator::{
    LocalTunnelBinding, NodeConfig, PeerConfiguration, PeerNetworkConfigurator, TUNNEL_BASE_PORT,
};
pub use descriptor::{PeerConnection, PeerDescriptor};
pub use writer::{apply_node_config, write_tunnel_record};

use thiserror::Error;

/// Peer configuration errors
#[derive(Debug, Error)]
pub enum PeerError {
    /// A validator's peer descriptor is malformed
    #[error("invalid peer descriptor #{index} ({id:?}): {reason}")]
    InvalidPeerDescriptor {
        /// Position of the validator in the contribution list
        index: usize,
        /// Node id as given
        id: String,
        /// What is wrong with it
        reason: String,
    },

    /// The tunnel port for a validator does not fit in a port number
    #[error("tunnel port {port} for peer #{index} is out of range")]
    PortOverflow {
        /// Position of the validator in the contribution list
        index: usize,
        /// Computed port
        port: usize,
    },

    /// The node configuration is not valid TOML
    #[error("invalid node config: {0}")]
    Toml(#[from] toml_edit::TomlError),

    /// The tunnel record could not be serialized
    #[error("tunnel record serialization error: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
