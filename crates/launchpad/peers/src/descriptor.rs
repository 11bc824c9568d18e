use serde::{Deserialize, Serialize};

/// How a validator's node can be reached
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PeerConnection {
    /// Directly, at `host:port`
    TcpAddress {
        /// `host:port`
        address: String,
    },
    /// Through an HTTP tunnel relay
    HttpTunnel {
        /// Tunnel name at the relay
        name: String,
        /// Relay address
        address: String,
    },
}

/// A validator's node id and connectivity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerDescriptor {
    /// Node id
    pub id: String,
    /// Connectivity, absent when the contributor sent none
    #[serde(default)]
    pub connection: Option<PeerConnection>,
}

impl PeerDescriptor {
    /// A directly reachable peer
    pub fn tcp(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            connection: Some(PeerConnection::TcpAddress { address: address.into() }),
        }
    }

    /// A peer reached through a tunnel relay
    pub fn tunnel(id: impl Into<String>, name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            connection: Some(PeerConnection::HttpTunnel { name: name.into(), address: address.into() }),
        }
    }

    /// The connection, if the descriptor is well formed
    pub fn validate(&self) -> Result<&PeerConnection, String> {
        if self.id.trim().is_empty() {
            return Err("empty node id".to_owned());
        }

        let connection = self.connection.as_ref().ok_or_else(|| "missing connection".to_owned())?;
        match connection {
            PeerConnection::TcpAddress { address } => validate_host_port(address)?,
            PeerConnection::HttpTunnel { name, address } => {
                if name.trim().is_empty() {
                    return Err("empty tunnel name".to_owned());
                }
                if address.trim().is_empty() {
                    return Err("empty tunnel address".to_owned());
                }
            }
        }
        Ok(connection)
    }
}

fn validate_host_port(address: &str) -> Result<(), String> {
    let unparsable = || format!("unparsable host:port {address:?}");
    let (host, port) = address.rsplit_once(':').ok_or_else(unparsable)?;
    if host.is_empty() || host.contains(char::is_whitespace) {
        return Err(unparsable());
    }
    port.parse::<u16>().map_err(|_| unparsable())?;
    Ok(())
}
