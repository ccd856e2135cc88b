use std::path::{Path, PathBuf};
use std::sync::Arc;

use uuid::Uuid;

use crate::bc_manager::BcManager;
use crate::ports::PortAllocator;
use common::prelude::*;
use common::shell::shell_quote;

pub const MANAGER_SECTION: &str = "Manager-Fabric";
pub const MAX_CHANNEL_NAME_LENGTH: usize = 250;
pub const MSP_ID: &str = "Org1MSP";

pub const KEY_CHANNEL_NAME: &str = "channel_name";
pub const KEY_MSP_ID: &str = "msp_id";
pub const KEY_CERT_PATH: &str = "cert_path";
pub const KEY_KEY_PATH: &str = "key_path";
pub const KEY_TLS_CERT_PATH: &str = "tls_cert_path";
pub const KEY_GATEWAY_PEER: &str = "gateway_peer";
pub const KEY_TEST_NETWORK_PATH: &str = "test_network_path";
pub const KEY_PEER_PORT: &str = "peer_port";
pub const KEY_OPERATIONS_PORT: &str = "peer_operations_port";
pub const KEY_PEER_ENDPOINT: &str = "peer_endpoint";

/// Container labels set by the network scripts.
const CHANNEL_LABEL: &str = "com.trustdble.channel";
const NETWORK_LABEL: &str = "com.trustdble.fabric-network=test-network";

const ORG_CRYPTO_PATH: &str = "organizations/peerOrganizations/org1.example.com";
const USER_MSP_PATH: &str = "users/User1@org1.example.com/msp";

#[derive(Debug, Clone, PartialEq)]
pub struct FabricManagerConfig {
    pub start_script_path: PathBuf,
    pub test_network_dir: PathBuf,
    /// First port probed for a peer's gRPC endpoint.
    pub peer_port: u16,
    /// First port probed for a peer's operations endpoint.
    pub operations_port: u16,
}

impl FromConfigTree for FabricManagerConfig {
    fn from_tree(tree: &ConfigTree) -> Result<Self, ChainError> {
        let key = |k: &str| format!("{}.{}", MANAGER_SECTION, k);
        Ok(FabricManagerConfig {
            start_script_path: tree.get_str(&key("start-script-path"))?.into(),
            test_network_dir: tree.get_str(&key("test-network-dir"))?.into(),
            peer_port: tree.get(&key("peer-port"))?,
            operations_port: tree.get(&key("operations-port"))?,
        })
    }
}

/// Turns a network name into a channel id: lowercase, starting at the first
/// letter, `_` mapped to `-`, anything outside `[a-z0-9.-]` dropped, then
/// `-<token>` appended.
pub fn to_channel_name(name: &str, token: &str) -> Result<String, ChainError> {
    let lower = name.to_lowercase();
    let start = lower.find(|c: char| c.is_ascii_lowercase()).ok_or_else(|| {
        ChainError::InvalidOperation(format!(
            "network name '{}' needs at least one letter",
            name
        ))
    })?;
    let mut channel: String = lower[start..]
        .chars()
        .map(|c| if c == '_' { '-' } else { c })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-' || *c == '.')
        .collect();
    channel.push('-');
    channel.push_str(token);
    if channel.len() > MAX_CHANNEL_NAME_LENGTH {
        return Err(ChainError::InvalidOperation(format!(
            "channel name for '{}' exceeds {} characters",
            name, MAX_CHANNEL_NAME_LENGTH
        )));
    }
    Ok(channel)
}

pub fn random_token() -> String {
    Uuid::new_v4().to_string()
}

/// Drives the channel-based test network through its start script.
///
/// `create_network` brings up a channel and immediately joins a first peer.
/// Each join adds one peer container; leaving removes it and, once nothing
/// is labelled with the channel or the network any more, removes the channel
/// artifact and brings the network down. Earlier steps are not rolled back
/// when a later one fails.
pub struct FabricManager {
    runner: Arc<dyn CommandRunner>,
    ports: PortAllocator,
    config: Option<FabricManagerConfig>,
}

impl FabricManager {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        FabricManager {
            ports: PortAllocator::new(runner.clone()),
            runner,
            config: None,
        }
    }

    pub fn with_ports(mut self, ports: PortAllocator) -> Self {
        self.ports = ports;
        self
    }

    pub fn with_config(mut self, config: FabricManagerConfig) -> Self {
        self.config = Some(config);
        self
    }

    fn config(&self) -> Result<FabricManagerConfig, ChainError> {
        self.config.clone().ok_or_else(|| {
            ChainError::InvalidOperation("fabric manager is not initialized".to_string())
        })
    }

    fn script(&self, config: &FabricManagerConfig, args: &str) -> Result<ExecOutput, ChainError> {
        let cmd = format!(
            "bash {} {}",
            shell_quote(&config.start_script_path.to_string_lossy()),
            args
        );
        self.runner.exec_checked(&cmd)
    }

    /// Ids of containers matching a `docker ps` filter. Fails if the runtime
    /// query fails.
    fn containers(&self, filter: &str, all: bool) -> Result<Vec<String>, ChainError> {
        let cmd = format!(
            "docker ps {}-q --filter {}",
            if all { "-a " } else { "" },
            shell_quote(filter)
        );
        let out = self.runner.exec_checked(&cmd)?;
        Ok(out.lines().map(str::to_string).collect())
    }

    fn labelled_containers(&self, label: &str) -> Result<Vec<String>, ChainError> {
        self.containers(&format!("label={}", label), false)
    }

    /// Peer containers are named after the peer.
    fn peer_exists(&self, name: &str) -> Result<bool, ChainError> {
        Ok(!self
            .containers(&format!("name=^{}$", name), true)?
            .is_empty())
    }

    fn set_peer_identity(config: &FabricManagerConfig, name: &str, network: &mut NetworkConfig) {
        let crypto = config.test_network_dir.join(ORG_CRYPTO_PATH);
        network.set(
            KEY_TLS_CERT_PATH,
            crypto
                .join("peers")
                .join(name)
                .join("tls/ca.crt")
                .to_string_lossy(),
        );
        network.set(KEY_GATEWAY_PEER, name);
    }
}

impl BcManager for FabricManager {
    fn init(&mut self, config_path: &Path) -> Result<(), ChainError> {
        self.config = Some(FabricManagerConfig::from_config_file(config_path)?);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), ChainError> {
        Ok(())
    }

    fn create_network(&mut self, name: &str) -> Result<NetworkConfig, ChainError> {
        let config = self.config()?;
        if self.peer_exists(name)? {
            return Err(ChainError::AlreadyExists(format!("peer {} already exists", name)));
        }
        let channel = to_channel_name(name, &random_token())?;
        let dir = config.test_network_dir.to_string_lossy().to_string();

        self.script(
            &config,
            &format!("up {} --network-name {}", shell_quote(&dir), channel),
        )?;
        info!("FabricManager: channel {} is up", channel);

        let crypto = config.test_network_dir.join(ORG_CRYPTO_PATH);
        let user_msp = crypto.join(USER_MSP_PATH);
        let mut network = NetworkConfig::new(&channel);
        network.set(KEY_CHANNEL_NAME, &channel);
        network.set(KEY_MSP_ID, MSP_ID);
        network.set(KEY_CERT_PATH, user_msp.join("signcerts/cert.pem").to_string_lossy());
        // Trailing separator: the key file name is generated per run.
        network.set(
            KEY_KEY_PATH,
            format!("{}/", user_msp.join("keystore").to_string_lossy()),
        );
        network.set(KEY_TEST_NETWORK_PATH, &dir);

        self.join_network(name, &mut network)?;
        Ok(network)
    }

    fn join_network(&mut self, name: &str, network: &mut NetworkConfig) -> Result<(), ChainError> {
        let config = self.config()?;
        let channel = network.get_str(KEY_CHANNEL_NAME)?;
        if self.peer_exists(name)? {
            return Err(ChainError::AlreadyExists(format!("peer {} already exists", name)));
        }

        let peer_port = self.ports.allocate(config.peer_port)?;
        let operations_port = self.ports.allocate(config.operations_port)?;
        network.set(KEY_PEER_PORT, peer_port);
        network.set(KEY_OPERATIONS_PORT, operations_port);
        network.set(KEY_PEER_ENDPOINT, format!("localhost:{}", peer_port));
        Self::set_peer_identity(&config, name, network);

        let joined = self.script(
            &config,
            &format!(
                "join {} --network-name {} --peer-name {} --peer-port {} --operations-port {}",
                shell_quote(&config.test_network_dir.to_string_lossy()),
                channel,
                shell_quote(name),
                peer_port,
                operations_port
            ),
        );
        if let Err(e) = joined {
            self.ports.release(peer_port);
            self.ports.release(operations_port);
            return Err(e);
        }
        info!("FabricManager: peer {} joined channel {}", name, channel);
        Ok(())
    }

    fn leave_network(&mut self, name: &str, network: &mut NetworkConfig) -> Result<(), ChainError> {
        let config = self.config()?;
        let channel = network.get_str(KEY_CHANNEL_NAME)?;
        if !self.peer_exists(name)? {
            return Err(ChainError::NotFound(format!("peer {} does not exist", name)));
        }

        self.script(&config, &format!("remove --peer-name {}", shell_quote(name)))?;
        info!("FabricManager: removed peer {}", name);
        if let Ok(port) = network.get::<u16>(KEY_PEER_PORT) {
            self.ports.release(port);
        }
        if let Ok(port) = network.get::<u16>(KEY_OPERATIONS_PORT) {
            self.ports.release(port);
        }

        if self
            .labelled_containers(&format!("{}={}", CHANNEL_LABEL, channel))?
            .is_empty()
        {
            let block = config
                .test_network_dir
                .join("channel-artifacts")
                .join(format!("{}.block", channel));
            self.runner
                .exec_checked(&format!("rm -f {}", shell_quote(&block.to_string_lossy())))?;
            debug!("FabricManager: channel {} has no peers left", channel);
        }

        if self.labelled_containers(NETWORK_LABEL)?.is_empty() {
            self.script(
                &config,
                &format!("down {}", shell_quote(&config.test_network_dir.to_string_lossy())),
            )?;
            info!("FabricManager: test network is down");
        }
        Ok(())
    }

    fn bc_type(&self) -> BcType {
        BcType::Fabric
    }
}
