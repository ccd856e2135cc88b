use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::bc_manager::BcManager;
use crate::peer_info::{geth_console_cmd, GethAttach, PeerInfo};
use crate::ports::PortAllocator;
use common::prelude::*;
use common::shell::{shell_quote, TEN_SEC, THREE_MIN};

pub const MANAGER_SECTION: &str = "Manager-Ethereum";
pub const CONTAINER_PREFIX: &str = "ethereum-node_";

pub const KEY_RPC_PORT: &str = "rpc-port";
pub const KEY_PEER_PORT: &str = "peer-port";
pub const KEY_JOIN_IP: &str = "join-ip";
pub const KEY_ENODE: &str = "enode";

#[derive(Debug, Clone, PartialEq)]
pub struct EthereumManagerConfig {
    /// First port probed for the node's JSON-RPC endpoint.
    pub rpc_port: u16,
    /// First port probed for the node's p2p endpoint.
    pub peer_port: u16,
    /// Address other nodes use to reach nodes started here.
    pub join_ip: String,
    pub start_script_path: PathBuf,
    pub docker_file_path: PathBuf,
    /// How long to wait for a new network to seal its first block.
    pub startup_timeout: Duration,
    /// How long to retry console commands against a starting node.
    pub console_timeout: Duration,
}

impl FromConfigTree for EthereumManagerConfig {
    fn from_tree(tree: &ConfigTree) -> Result<Self, ChainError> {
        let key = |k: &str| format!("{}.{}", MANAGER_SECTION, k);
        Ok(EthereumManagerConfig {
            rpc_port: tree.get(&key("rpc-port"))?,
            peer_port: tree.get(&key("peer-port"))?,
            join_ip: tree.get_str(&key("join-ip"))?,
            start_script_path: tree.get_str(&key("start-script-path"))?.into(),
            docker_file_path: tree.get_str(&key("docker-file-path"))?.into(),
            startup_timeout: tree
                .get_opt::<u64>(&key("startup-timeout-secs"))?
                .map(Duration::from_secs)
                .unwrap_or(THREE_MIN),
            console_timeout: tree
                .get_opt::<u64>(&key("console-timeout-secs"))?
                .map(Duration::from_secs)
                .unwrap_or(TEN_SEC),
        })
    }
}

/// Runs one geth node container per network member.
///
/// The container name `ethereum-node_<name>` doubles as the duplicate guard:
/// creating or joining with a name whose container exists fails. Failed
/// provisioning removes the container it started.
pub struct EthereumManager {
    runner: Arc<dyn CommandRunner>,
    peer_info: Box<dyn PeerInfo>,
    ports: PortAllocator,
    config: Option<EthereumManagerConfig>,
    /// (rpc, peer) ports per container started by this manager.
    node_ports: HashMap<String, (u16, u16)>,
}

impl EthereumManager {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        EthereumManager {
            peer_info: Box::new(GethAttach::new(runner.clone())),
            ports: PortAllocator::new(runner.clone()),
            runner,
            config: None,
            node_ports: HashMap::new(),
        }
    }

    pub fn with_ports(mut self, ports: PortAllocator) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_peer_info(mut self, peer_info: Box<dyn PeerInfo>) -> Self {
        self.peer_info = peer_info;
        self
    }

    pub fn with_config(mut self, config: EthereumManagerConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn container_name(name: &str) -> String {
        format!("{}{}", CONTAINER_PREFIX, name)
    }

    fn config(&self) -> Result<EthereumManagerConfig, ChainError> {
        self.config.clone().ok_or_else(|| {
            ChainError::InvalidOperation("ethereum manager is not initialized".to_string())
        })
    }

    fn container_exists(&self, container: &str) -> bool {
        self.runner
            .exec(&format!("docker container inspect {}", container))
            .success
    }

    /// Allocates ports, records them in `network` and starts the container.
    fn start_node(
        &mut self,
        config: &EthereumManagerConfig,
        container: &str,
        network: &mut NetworkConfig,
    ) -> Result<(), ChainError> {
        let rpc_port = self.ports.allocate(config.rpc_port)?;
        let peer_port = match self.ports.allocate(config.peer_port) {
            Ok(p) => p,
            Err(e) => {
                self.ports.release(rpc_port);
                return Err(e);
            }
        };
        self.node_ports
            .insert(container.to_string(), (rpc_port, peer_port));

        network.set(KEY_RPC_PORT, rpc_port);
        network.set(KEY_PEER_PORT, peer_port);
        network.set(KEY_JOIN_IP, &config.join_ip);

        let cmd = format!(
            "bash {} {} {} {} {}",
            shell_quote(&config.start_script_path.to_string_lossy()),
            container,
            rpc_port,
            peer_port,
            shell_quote(&config.docker_file_path.to_string_lossy())
        );
        self.runner.exec_checked(&cmd)?;
        info!(
            "EthereumManager: started {} (rpc {}, peer {})",
            container, rpc_port, peer_port
        );
        Ok(())
    }

    fn wait_for_first_block(
        &self,
        config: &EthereumManagerConfig,
        container: &str,
    ) -> Result<(), ChainError> {
        let cmd = format!(
            "docker logs {} 2>&1 | grep -q 'Successfully sealed new block'",
            container
        );
        self.runner.retry_checked(&cmd, config.startup_timeout)?;
        debug!("EthereumManager: {} sealed its first block", container);
        Ok(())
    }

    fn own_enode(
        &self,
        config: &EthereumManagerConfig,
        container: &str,
        peer_port: u16,
    ) -> Result<String, ChainError> {
        let prefix = self
            .peer_info
            .enode_prefix(container, config.console_timeout)?;
        Ok(format!("{}{}:{}", prefix, config.join_ip, peer_port))
    }

    fn remove_container(&mut self, container: &str) -> Result<(), ChainError> {
        self.runner
            .exec_checked(&format!("docker stop {}", container))?;
        self.runner
            .exec_checked(&format!("docker container rm {}", container))?;
        if let Some((rpc, peer)) = self.node_ports.remove(container) {
            self.ports.release(rpc);
            self.ports.release(peer);
        }
        Ok(())
    }

    /// Best-effort cleanup after a failed create or join.
    fn discard_node(&mut self, container: &str) {
        let _ = self
            .runner
            .exec(&format!("docker rm -f {}", container));
        if let Some((rpc, peer)) = self.node_ports.remove(container) {
            self.ports.release(rpc);
            self.ports.release(peer);
        }
    }

    fn provision_first_node(
        &mut self,
        config: &EthereumManagerConfig,
        container: &str,
        network: &mut NetworkConfig,
    ) -> Result<(), ChainError> {
        self.start_node(config, container, network)?;
        self.wait_for_first_block(config, container)?;
        let peer_port: u16 = network.get(KEY_PEER_PORT)?;
        let enode = self.own_enode(config, container, peer_port)?;
        network.set(KEY_ENODE, enode);
        Ok(())
    }

    fn provision_joining_node(
        &mut self,
        config: &EthereumManagerConfig,
        container: &str,
        remote_enode: &str,
        network: &mut NetworkConfig,
    ) -> Result<(), ChainError> {
        self.start_node(config, container, network)?;
        let add_peer = geth_console_cmd(container, &format!("admin.addPeer(\"{}\")", remote_enode));
        self.runner
            .retry_checked(&add_peer, config.console_timeout)?;
        debug!("EthereumManager: {} peered with {}", container, remote_enode);
        let peer_port: u16 = network.get(KEY_PEER_PORT)?;
        let enode = self.own_enode(config, container, peer_port)?;
        network.set(KEY_ENODE, enode);
        Ok(())
    }
}

impl BcManager for EthereumManager {
    fn init(&mut self, config_path: &Path) -> Result<(), ChainError> {
        self.config = Some(EthereumManagerConfig::from_config_file(config_path)?);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), ChainError> {
        Ok(())
    }

    fn create_network(&mut self, name: &str) -> Result<NetworkConfig, ChainError> {
        let config = self.config()?;
        let container = Self::container_name(name);
        if self.container_exists(&container) {
            return Err(ChainError::AlreadyExists(format!(
                "container {} already exists",
                container
            )));
        }

        let mut network = NetworkConfig::new(name);
        if let Err(e) = self.provision_first_node(&config, &container, &mut network) {
            error!("EthereumManager: create network {} failed: {}", name, e);
            self.discard_node(&container);
            return Err(e);
        }
        info!("EthereumManager: created network {}", name);
        Ok(network)
    }

    fn join_network(&mut self, name: &str, network: &mut NetworkConfig) -> Result<(), ChainError> {
        let config = self.config()?;
        let remote_enode = network.get_str(KEY_ENODE)?;
        let container = Self::container_name(name);
        if self.container_exists(&container) {
            return Err(ChainError::AlreadyExists(format!(
                "container {} already exists",
                container
            )));
        }

        if let Err(e) = self.provision_joining_node(&config, &container, &remote_enode, network) {
            error!("EthereumManager: join {} failed: {}", name, e);
            self.discard_node(&container);
            return Err(e);
        }
        info!(
            "EthereumManager: {} joined network {}",
            name,
            network.id().unwrap_or_default()
        );
        Ok(())
    }

    fn leave_network(&mut self, name: &str, _network: &mut NetworkConfig) -> Result<(), ChainError> {
        let container = Self::container_name(name);
        if !self.container_exists(&container) {
            return Err(ChainError::NotFound(format!(
                "container {} does not exist",
                container
            )));
        }
        self.remove_container(&container)?;
        info!("EthereumManager: removed {}", container);
        Ok(())
    }

    fn bc_type(&self) -> BcType {
        BcType::Ethereum
    }
}
