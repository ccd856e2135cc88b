use std::path::Path;

use common::prelude::*;

/// Provisions and tears down blockchain networks for one backend.
///
/// A network goes through `create_network` (first node), any number of
/// `join_network` calls (further local nodes, each with its own name) and one
/// `leave_network` per node. The [`NetworkConfig`] returned by
/// `create_network` carries everything a joining node needs and is written
/// back to by `join_network`.
pub trait BcManager {
    /// Reads the backend's static configuration from `config_path`.
    /// Calling it again replaces the previous configuration.
    /// Fails with [`ChainError::ConfigError`] if the file is unreadable or a
    /// required key is missing.
    fn init(&mut self, config_path: &Path) -> Result<(), ChainError>;

    /// Releases manager resources. Running networks are not touched.
    fn shutdown(&mut self) -> Result<(), ChainError>;

    /// Provisions a new network named `name` and returns its config, which
    /// always includes `Network.id`. Fails with
    /// [`ChainError::AlreadyExists`] when a network or node of that name is
    /// already present.
    fn create_network(&mut self, name: &str) -> Result<NetworkConfig, ChainError>;

    /// Starts a local node called `name` attached to the network described
    /// by `config` and writes the locally resolved fields (ports, peer
    /// identity) back into `config`.
    fn join_network(&mut self, name: &str, config: &mut NetworkConfig) -> Result<(), ChainError>;

    /// Removes the local node `name`. Shared resources go away with the last
    /// member. A second call for the same node reports
    /// [`ChainError::NotFound`].
    fn leave_network(&mut self, name: &str, config: &mut NetworkConfig)
        -> Result<(), ChainError>;

    fn bc_type(&self) -> BcType;
}
