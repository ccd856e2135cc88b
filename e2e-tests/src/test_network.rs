use std::fs;
use std::path::{Path, PathBuf};

use adapter::{create_adapter, BcAdapter};
use common::prelude::*;
use manager::{create_manager, BcManager};
use tempfile::{tempdir, TempDir};

/// A stub network in a temporary directory, created by its first member.
/// Whatever is left of the network is removed when the `TestNetwork` is
/// dropped.
pub struct TestNetwork {
    root: TempDir,
    config: PathBuf,
    manager: Box<dyn BcManager>,
    network: Option<NetworkConfig>,
    network_name: String,
}

impl TestNetwork {
    pub fn stub(name: &str, blocksize: u64) -> Self {
        let root = tempdir().unwrap();
        let config = root.path().join("chain.ini");
        fs::write(
            &config,
            format!(
                "[Manager-Stub]\nstub-network-path = {0}\n\n[Adapter-Stub]\ndata-path = {0}\nblocksize = {1}\n",
                root.path().display(),
                blocksize
            ),
        )
        .unwrap();

        let mut manager = create_manager(BcType::Stub);
        manager.init(&config).unwrap();
        let network = manager.create_network(name).unwrap();
        info!("TestNetwork: created {}", network);
        let network_name = network.get_str("network-name").unwrap();
        Self {
            root,
            config,
            manager,
            network: Some(network),
            network_name,
        }
    }

    pub fn root(&self) -> &Path {
        self.root.path()
    }

    pub fn config_path(&self) -> &Path {
        &self.config
    }

    pub fn network(&self) -> &NetworkConfig {
        self.network.as_ref().unwrap()
    }

    pub fn network_dir(&self) -> PathBuf {
        self.root.path().join(&self.network_name)
    }

    /// A fresh adapter bound to this network.
    pub fn adapter(&self) -> Box<dyn BcAdapter> {
        let mut adapter = create_adapter(BcType::Stub);
        adapter
            .init_with_network(&self.config, &self.network().to_json())
            .unwrap();
        adapter
    }

    /// A second manager, as another node would run it.
    pub fn node(&self) -> Box<dyn BcManager> {
        let mut manager = create_manager(BcType::Stub);
        manager.init(&self.config).unwrap();
        manager
    }

    pub fn join(&self, node: &mut dyn BcManager, name: &str) -> Result<(), ChainError> {
        let mut network = self.network().clone();
        node.join_network(name, &mut network)
    }

    pub fn leave(&mut self) -> Result<(), ChainError> {
        let mut network = match self.network.take() {
            Some(network) => network,
            None => return Ok(()),
        };
        let name = network.id().unwrap_or_default();
        self.manager.leave_network(&name, &mut network)
    }
}

impl Drop for TestNetwork {
    fn drop(&mut self) {
        if let Err(e) = self.leave() {
            debug!("TestNetwork: leave on drop failed: {}", e);
        }
    }
}
