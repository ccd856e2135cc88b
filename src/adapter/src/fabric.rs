use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::bc_adapter::BcAdapter;
use crate::contract::{ContractClient, ContractTable, FabricConnection, PeerCliClient};
use common::prelude::*;
use common::shell::shell_quote;

pub const ADAPTER_SECTION: &str = "Adapter-Fabric";
pub const DEPLOY_SCRIPT: &str = "fabric/scripts/deployContract.sh";
const DEFAULT_ORDERER_ENDPOINT: &str = "localhost:7050";

/// Network keys a Fabric manager publishes and the adapter consumes.
const NETWORK_KEYS: [&str; 8] = [
    "channel_name",
    "msp_id",
    "cert_path",
    "key_path",
    "tls_cert_path",
    "gateway_peer",
    "peer_endpoint",
    "test_network_path",
];

/// Static adapter settings merged with the values of a joined network.
#[derive(Debug, Clone)]
pub struct FabricAdapterConfig {
    tree: ConfigTree,
}

impl FromConfigTree for FabricAdapterConfig {
    fn from_tree(tree: &ConfigTree) -> Result<Self, ChainError> {
        let config = FabricAdapterConfig { tree: tree.clone() };
        config.adapters_path()?;
        Ok(config)
    }
}

impl FabricAdapterConfig {
    fn key(k: &str) -> String {
        format!("{}.{}", ADAPTER_SECTION, k)
    }

    fn get_str(&self, k: &str) -> Result<String, ChainError> {
        self.tree.get_str(&Self::key(k))
    }

    pub fn set_network_config(&mut self, network: &NetworkConfig) -> Result<(), ChainError> {
        for k in NETWORK_KEYS {
            let value = network.get_str(k)?;
            self.tree.put(&Self::key(k), value);
        }
        Ok(())
    }

    pub fn adapters_path(&self) -> Result<PathBuf, ChainError> {
        Ok(self.get_str("adapters-path")?.into())
    }

    pub fn test_network_path(&self) -> Result<PathBuf, ChainError> {
        Ok(self.get_str("test_network_path")?.into())
    }

    pub fn channel_name(&self) -> Result<String, ChainError> {
        self.get_str("channel_name")
    }

    pub fn peer_endpoint(&self) -> Result<String, ChainError> {
        self.get_str("peer_endpoint")
    }

    /// Seconds an invoke is retried while the peer is unavailable.
    pub fn invoke_timeout(&self) -> Result<Duration, ChainError> {
        Ok(self
            .tree
            .get_opt::<u64>(&Self::key("invoke-timeout-secs"))?
            .map(Duration::from_secs)
            .unwrap_or(Duration::ZERO))
    }

    /// Connection to the contract named after the channel.
    pub fn connection(&self) -> Result<FabricConnection, ChainError> {
        let channel = self.channel_name()?;
        let key_path = PathBuf::from(self.get_str("key_path")?);
        let msp_dir = key_path
            .parent()
            .map(Path::to_path_buf)
            .ok_or_else(|| c_err("key_path has no parent directory"))?;
        Ok(FabricConnection {
            contract: channel.clone(),
            channel,
            msp_id: self.get_str("msp_id")?,
            msp_dir,
            tls_cert_path: self.get_str("tls_cert_path")?.into(),
            peer_endpoint: self.peer_endpoint()?,
            gateway_peer: self.get_str("gateway_peer")?,
            orderer_endpoint: self
                .tree
                .get_opt::<String>(&Self::key("orderer-endpoint"))?
                .unwrap_or_else(|| DEFAULT_ORDERER_ENDPOINT.to_string()),
            test_network_path: self.test_network_path()?,
        })
    }
}

pub type ClientFactory =
    Box<dyn Fn(&FabricConnection) -> Box<dyn ContractClient> + Send + Sync>;

/// Tables hosted by one contract deployed on a Fabric channel.
pub struct FabricAdapter {
    runner: Arc<dyn CommandRunner>,
    config: Option<FabricAdapterConfig>,
    table: Option<ContractTable>,
    client_factory: Option<ClientFactory>,
}

impl FabricAdapter {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        FabricAdapter {
            runner,
            config: None,
            table: None,
            client_factory: None,
        }
    }

    /// Replaces the default `peer` CLI transport.
    pub fn with_client_factory(mut self, factory: ClientFactory) -> Self {
        self.client_factory = Some(factory);
        self
    }

    pub fn init_with_config(&mut self, config: FabricAdapterConfig) -> Result<(), ChainError> {
        if let Ok(dir) = config.test_network_path() {
            if !dir.is_dir() {
                return Err(ChainError::ConfigError(format!(
                    "test network directory {} does not exist",
                    dir.display()
                )));
            }
        }
        self.config = Some(config);
        self.table = None;
        Ok(())
    }

    fn config(&self) -> Result<&FabricAdapterConfig, ChainError> {
        self.config
            .as_ref()
            .ok_or_else(|| ChainError::InvalidOperation("fabric adapter is not initialized".to_string()))
    }

    fn table(&self) -> Result<&ContractTable, ChainError> {
        self.table
            .as_ref()
            .ok_or_else(|| ChainError::InvalidOperation("no table loaded".to_string()))
    }

    fn client(&self, conn: &FabricConnection) -> Result<Box<dyn ContractClient>, ChainError> {
        Ok(match &self.client_factory {
            Some(factory) => factory(conn),
            None => Box::new(
                PeerCliClient::new(self.runner.clone(), conn.clone())
                    .with_invoke_timeout(self.config()?.invoke_timeout()?),
            ),
        })
    }

    fn deploy_contract(&self) -> Result<(), ChainError> {
        let config = self.config()?;
        let adapters = config.adapters_path()?;
        let channel = config.channel_name()?;
        let cmd = format!(
            "bash {} {} {} {} {} {}",
            shell_quote(&adapters.join(DEPLOY_SCRIPT).to_string_lossy()),
            shell_quote(&channel),
            shell_quote(&channel),
            shell_quote(&config.peer_endpoint()?),
            shell_quote(&config.test_network_path()?.to_string_lossy()),
            shell_quote(&adapters.to_string_lossy()),
        );
        self.runner.exec_checked(&cmd)?;
        debug!("fabric: contract {} deployed", channel);
        Ok(())
    }

    /// Deletes all `keys` in one transaction. Fails without deleting anything
    /// if one of them is absent.
    pub fn remove_batch(&mut self, keys: &[Bytes]) -> Result<(), ChainError> {
        let table = self.table()?;
        if keys.is_empty() {
            return Ok(());
        }
        table.delete(keys).map_err(|e| match e {
            ChainError::CommandFailed(msg) if msg.to_lowercase().contains("not found") => {
                ChainError::NotFound(msg)
            }
            e => e,
        })
    }
}

impl BcAdapter for FabricAdapter {
    fn init(&mut self, config_path: &Path) -> Result<(), ChainError> {
        debug!("fabric: init, config-path={}", config_path.display());
        self.init_with_config(FabricAdapterConfig::from_config_file(config_path)?)
    }

    fn init_with_network(
        &mut self,
        config_path: &Path,
        network_config: &str,
    ) -> Result<(), ChainError> {
        debug!("fabric: init, config-path={}", config_path.display());
        let mut config = FabricAdapterConfig::from_config_file(config_path)?;
        config.set_network_config(&NetworkConfig::from_json(network_config)?)?;
        self.init_with_config(config)
    }

    fn shutdown(&mut self) -> Result<(), ChainError> {
        self.table = None;
        Ok(())
    }

    fn create_table(&mut self, name: &str) -> Result<String, ChainError> {
        self.load_table(name, "")?;
        Ok(hex::encode(name))
    }

    /// Tables live inside the channel contract, so the address is unused.
    fn load_table(&mut self, name: &str, _address: &str) -> Result<(), ChainError> {
        self.deploy_contract()?;
        let conn = self.config()?.connection()?;
        let client = self.client(&conn)?;
        self.table = Some(ContractTable::new(name, client));
        Ok(())
    }

    /// The contract itself stays deployed; only the entries are removed.
    fn drop_table(&mut self) -> Result<(), ChainError> {
        let keys: Vec<Bytes> = self.get_all()?.into_keys().collect();
        self.remove_batch(&keys)?;
        debug!("fabric: dropped {} entries", keys.len());
        Ok(())
    }

    fn put(&mut self, batch: &mut Batch) -> Result<(), ChainError> {
        let table = self.table()?;
        if batch.is_empty() {
            return Ok(());
        }
        match table.put(batch) {
            Ok(()) => {
                debug!("fabric: put {} entries", batch.len());
                batch.clear();
                Ok(())
            }
            Err(e) => {
                warn!("fabric: put of {} entries failed: {}", batch.len(), e);
                Err(e)
            }
        }
    }

    fn get(&self, key: &Bytes) -> Result<Bytes, ChainError> {
        self.table()?.get(key)
    }

    fn get_all(&self) -> Result<Batch, ChainError> {
        self.table()?.get_all()
    }

    fn remove(&mut self, key: &Bytes) -> Result<(), ChainError> {
        self.remove_batch(std::slice::from_ref(key))
    }

    fn bc_type(&self) -> BcType {
        BcType::Fabric
    }
}
