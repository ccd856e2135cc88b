use std::sync::Arc;
use std::time::Duration;

use common::prelude::*;
use common::shell::shell_quote;

const ENODE_SCHEME: &str = "enode://";

/// Looks up the peer handle a node advertises to other nodes.
pub trait PeerInfo {
    /// Returns `enode://<node id>@`, ready to be completed with the host and
    /// port other nodes should dial.
    fn enode_prefix(&self, container: &str, timeout: Duration) -> Result<String, ChainError>;
}

/// Asks geth inside the node container through its IPC socket.
pub struct GethAttach {
    runner: Arc<dyn CommandRunner>,
}

impl GethAttach {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        GethAttach { runner }
    }
}

pub fn geth_console_cmd(container: &str, script: &str) -> String {
    let inner = format!("geth --exec {} attach eth-data/geth.ipc", shell_quote(script));
    format!("docker exec {} /bin/bash -c {}", container, shell_quote(&inner))
}

impl PeerInfo for GethAttach {
    fn enode_prefix(&self, container: &str, timeout: Duration) -> Result<String, ChainError> {
        let cmd = geth_console_cmd(container, "admin.nodeInfo.enode");
        let out = self.runner.retry_checked(&cmd, timeout)?;
        parse_enode_prefix(&out.stdout)
    }
}

/// Cuts the enode handle out of console output such as
/// `"enode://ab12...@127.0.0.1:30303?discport=0"`, keeping everything from the
/// scheme up to and including the first `@`.
pub fn parse_enode_prefix(raw: &str) -> Result<String, ChainError> {
    let start = raw
        .find(ENODE_SCHEME)
        .ok_or_else(|| ChainError::DecodeError(format!("no enode in '{}'", raw.trim())))?;
    let rest = &raw[start..];
    let at = rest
        .find('@')
        .ok_or_else(|| ChainError::DecodeError(format!("enode without host: '{}'", raw.trim())))?;
    let prefix = &rest[..=at];
    if prefix.len() == ENODE_SCHEME.len() + 1 {
        return Err(ChainError::DecodeError("enode with empty node id".to_string()));
    }
    Ok(prefix.to_string())
}
