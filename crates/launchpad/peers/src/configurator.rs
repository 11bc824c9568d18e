use crate::{PeerConnection, PeerDescriptor, PeerError};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// First local port handed to tunneled peers
pub const TUNNEL_BASE_PORT: u16 = 22000;

/// Loopback host tunneled peers are dialled on
const TUNNEL_HOST: &str = "127.0.0.1";

/// Peer settings for the node's `config.toml`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeConfig {
    /// `nodeID@host:port` in validator order
    pub persistent_peers: Vec<String>,
    /// Set when several peers share the loopback address
    pub allow_duplicate_ip: bool,
}

/// A local port the relay client forwards to a tunneled peer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalTunnelBinding {
    /// Node id of the tunneled peer
    pub node_id: String,
    /// Tunnel name at the relay
    pub name: String,
    /// Relay address
    pub address: String,
    /// Local port the peer is dialled on
    pub local_port: u16,
}

/// Everything derived from the validators' peer descriptors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerConfiguration {
    /// Node configuration
    pub node: NodeConfig,
    /// Tunnel bindings, in validator order
    pub tunnels: Vec<LocalTunnelBinding>,
}

/// Derives [`PeerConfiguration`]s.
///
/// A tunneled peer's local port is the base port plus the validator's index
/// in the contribution list, so ports stay stable across runs.
#[derive(Debug, Clone, Copy)]
pub struct PeerNetworkConfigurator {
    base_port: u16,
}

impl Default for PeerNetworkConfigurator {
    fn default() -> Self {
        Self::new(TUNNEL_BASE_PORT)
    }
}

impl PeerNetworkConfigurator {
    /// Configurator allocating tunnel ports from `base_port`
    pub const fn new(base_port: u16) -> Self {
        Self { base_port }
    }

    /// Derive the peer configuration for `peers`, given in validator order.
    ///
    /// Every descriptor is validated before anything is derived.
    pub fn configure(&self, peers: &[PeerDescriptor]) -> Result<PeerConfiguration, PeerError> {
        let connections = peers
            .iter()
            .enumerate()
            .map(|(index, peer)| {
                peer.validate().map_err(|reason| PeerError::InvalidPeerDescriptor {
                    index,
                    id: peer.id.clone(),
                    reason,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut config = PeerConfiguration::default();
        for (index, (peer, connection)) in peers.iter().zip(connections).enumerate() {
            match connection {
                PeerConnection::TcpAddress { address } => {
                    config.node.persistent_peers.push(format!("{}@{address}", peer.id));
                }
                PeerConnection::HttpTunnel { name, address } => {
                    let port = usize::from(self.base_port) + index;
                    let local_port =
                        u16::try_from(port).map_err(|_| PeerError::PortOverflow { index, port })?;
                    config.node.persistent_peers.push(format!("{}@{TUNNEL_HOST}:{local_port}", peer.id));
                    config.tunnels.push(LocalTunnelBinding {
                        node_id: peer.id.clone(),
                        name: name.clone(),
                        address: address.clone(),
                        local_port,
                    });
                }
            }
        }
        config.node.allow_duplicate_ip = !config.tunnels.is_empty();

        debug!(
            target: "launchpad::peers",
            peers = config.node.persistent_peers.len(),
            tunnels = config.tunnels.len(),
            "Peer configuration derived"
        );
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn mixed_topology() {
        let peers = [
            PeerDescriptor::tcp("V1", "1.2.3.4:26656"),
            PeerDescriptor::tunnel("V2", "relayA", "https://relay-a.example.com"),
            PeerDescriptor::tunnel("V3", "relayB", "https://relay-b.example.com"),
        ];

        let config = PeerNetworkConfigurator::default().configure(&peers).unwrap();
        assert_eq!(
            config.node.persistent_peers,
            vec!["V1@1.2.3.4:26656", "V2@127.0.0.1:22001", "V3@127.0.0.1:22002"]
        );
        assert!(config.node.allow_duplicate_ip);
        assert_eq!(
            config.tunnels.iter().map(|t| (t.node_id.as_str(), t.local_port)).collect::<Vec<_>>(),
            vec![("V2", 22001), ("V3", 22002)]
        );
        assert_eq!(config.tunnels[0].name, "relayA");
    }

    #[test]
    fn direct_only_forbids_duplicate_ip() {
        let peers = [PeerDescriptor::tcp("V1", "1.2.3.4:26656"), PeerDescriptor::tcp("V2", "5.6.7.8:26656")];
        let config = PeerNetworkConfigurator::default().configure(&peers).unwrap();
        assert!(!config.node.allow_duplicate_ip);
        assert!(config.tunnels.is_empty());
    }

    #[test]
    fn ports_are_stable_across_runs() {
        let peers = [
            PeerDescriptor::tunnel("V1", "relayA", "https://relay"),
            PeerDescriptor::tcp("V2", "1.2.3.4:26656"),
            PeerDescriptor::tunnel("V3", "relayB", "https://relay"),
        ];
        let configurator = PeerNetworkConfigurator::new(30000);
        let first = configurator.configure(&peers).unwrap();
        assert_eq!(first, configurator.configure(&peers).unwrap());
        assert_eq!(first.tunnels.iter().map(|t| t.local_port).collect::<Vec<_>>(), vec![30000, 30002]);
    }

    #[test]
    fn malformed_descriptor_aborts() {
        let peers = [
            PeerDescriptor::tcp("V1", "1.2.3.4:26656"),
            PeerDescriptor { id: "V2".into(), connection: None },
        ];
        assert_matches!(
            PeerNetworkConfigurator::default().configure(&peers),
            Err(PeerError::InvalidPeerDescriptor { index: 1, id, .. }) if id == "V2"
        );
    }

    #[test]
    fn port_overflow() {
        let peers = [
            PeerDescriptor::tcp("V1", "1.2.3.4:26656"),
            PeerDescriptor::tunnel("V2", "relayA", "https://relay"),
        ];
        assert_matches!(
            PeerNetworkConfigurator::new(u16::MAX).configure(&peers),
            Err(PeerError::PortOverflow { index: 1, port: 65536 })
        );
    }
}
