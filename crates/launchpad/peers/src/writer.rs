//! Writing peer configuration to the chain home.

use crate::{LocalTunnelBinding, NodeConfig, PeerError};
use launchpad_fs_util::write_atomic;
use serde::Serialize;
use std::{io::ErrorKind, path::Path};
use tracing::info;

#[derive(Serialize)]
struct TunnelRecord<'a> {
    tunneled_peers: &'a [LocalTunnelBinding],
}

/// Replace `p2p.persistent_peers` and `p2p.allow_duplicate_ip` in the node
/// configuration at `path`, leaving the rest of the document untouched.
///
/// Nothing is written when there are no peers. Returns whether the file was
/// rewritten.
pub fn apply_node_config(path: &Path, node: &NodeConfig) -> Result<bool, PeerError> {
    if node.persistent_peers.is_empty() {
        return Ok(false);
    }

    let mut config: toml_edit::Document = std::fs::read_to_string(path)?.parse()?;
    if !config.get("p2p").is_some_and(toml_edit::Item::is_table) {
        config["p2p"] = toml_edit::table();
    }
    config["p2p"]["persistent_peers"] = toml_edit::value(node.persistent_peers.join(","));
    config["p2p"]["allow_duplicate_ip"] = toml_edit::value(node.allow_duplicate_ip);

    write_atomic(path, config.to_string().as_bytes())?;
    info!(
        target: "launchpad::peers",
        path = %path.display(),
        peers = node.persistent_peers.len(),
        allow_duplicate_ip = node.allow_duplicate_ip,
        "Node config updated"
    );
    Ok(true)
}

/// Record the tunnel bindings at `path` for the relay client.
///
/// Without tunnels any stale record is removed.
pub fn write_tunnel_record(path: &Path, tunnels: &[LocalTunnelBinding]) -> Result<(), PeerError> {
    if tunnels.is_empty() {
        return match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        };
    }

    let record = toml::to_string_pretty(&TunnelRecord { tunneled_peers: tunnels })?;
    write_atomic(path, record.as_bytes())?;
    info!(target: "launchpad::peers", path = %path.display(), tunnels = tunnels.len(), "Tunnel record written");
    Ok(())
}
