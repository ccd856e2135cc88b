use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::bc_adapter::BcAdapter;
use crate::contract::ethereum_client::deploy_contract;
use crate::contract::{ContractClient, ContractTable, EthereumScriptClient};
use common::prelude::*;

pub const ADAPTER_SECTION: &str = "Adapter-Ethereum";

#[derive(Debug, Clone, PartialEq)]
pub struct EthereumAdapterConfig {
    /// RPC endpoint of the geth node, `http://<ip>:<rpc-port>`.
    pub connection_url: String,
    /// Table contract used when `load_table` gets no address.
    pub contract_address: Option<String>,
    /// Compiled table contract handed to the deploy script.
    pub contract_path: String,
    pub max_waiting_time: Duration,
    pub script_path: PathBuf,
}

impl FromConfigTree for EthereumAdapterConfig {
    fn from_tree(tree: &ConfigTree) -> Result<Self, ChainError> {
        let key = |k: &str| format!("{}.{}", ADAPTER_SECTION, k);
        Ok(EthereumAdapterConfig {
            connection_url: tree
                .get_opt::<String>(&key("connection-url"))?
                .unwrap_or_default(),
            contract_address: tree
                .get_opt::<String>(&key("contract-address"))?
                .filter(|a| !a.is_empty()),
            contract_path: tree.get_str(&key("contract-path"))?,
            max_waiting_time: Duration::from_secs(tree.get(&key("max-waiting-time"))?),
            script_path: tree.get_str(&key("script-path"))?.into(),
        })
    }
}

impl EthereumAdapterConfig {
    /// Points the adapter at the node the network config was issued for.
    pub fn set_network_config(&mut self, network: &NetworkConfig) -> Result<(), ChainError> {
        self.connection_url = format!(
            "http://{}:{}",
            network.get_str("join-ip")?,
            network.get_str("rpc-port")?
        );
        Ok(())
    }
}

pub type ClientFactory = Box<dyn Fn(&str) -> Box<dyn ContractClient> + Send + Sync>;

/// One table contract per table on a geth network.
pub struct EthereumAdapter {
    runner: Arc<dyn CommandRunner>,
    config: Option<EthereumAdapterConfig>,
    table: Option<ContractTable>,
    client_factory: Option<ClientFactory>,
}

impl EthereumAdapter {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        EthereumAdapter {
            runner,
            config: None,
            table: None,
            client_factory: None,
        }
    }

    /// Replaces the script transport; the factory gets the contract address.
    pub fn with_client_factory(mut self, factory: ClientFactory) -> Self {
        self.client_factory = Some(factory);
        self
    }

    pub fn init_with_config(&mut self, config: EthereumAdapterConfig) -> Result<(), ChainError> {
        if !config.script_path.is_dir() {
            return Err(ChainError::ConfigError(format!(
                "script path {} does not exist",
                config.script_path.display()
            )));
        }
        if config.connection_url.is_empty() {
            return Err(ChainError::ConfigError(format!(
                "{}.connection-url is not set and no network was given",
                ADAPTER_SECTION
            )));
        }
        debug!("ethereum: using node {}", config.connection_url);
        self.config = Some(config);
        self.table = None;
        Ok(())
    }

    fn config(&self) -> Result<&EthereumAdapterConfig, ChainError> {
        self.config.as_ref().ok_or_else(|| {
            ChainError::InvalidOperation("ethereum adapter is not initialized".to_string())
        })
    }

    fn table(&self) -> Result<&ContractTable, ChainError> {
        self.table
            .as_ref()
            .ok_or_else(|| ChainError::InvalidOperation("no table loaded".to_string()))
    }

    fn attach(&mut self, name: &str, address: &str) -> Result<(), ChainError> {
        let client: Box<dyn ContractClient> = match &self.client_factory {
            Some(factory) => factory(address),
            None => {
                let config = self.config()?;
                Box::new(EthereumScriptClient::new(
                    self.runner.clone(),
                    &config.script_path,
                    &config.connection_url,
                    address,
                    config.max_waiting_time,
                ))
            }
        };
        self.table = Some(ContractTable::new(name, client));
        Ok(())
    }
}

impl BcAdapter for EthereumAdapter {
    fn init(&mut self, config_path: &Path) -> Result<(), ChainError> {
        self.init_with_config(EthereumAdapterConfig::from_config_file(config_path)?)
    }

    fn init_with_network(
        &mut self,
        config_path: &Path,
        network_config: &str,
    ) -> Result<(), ChainError> {
        let mut config = EthereumAdapterConfig::from_config_file(config_path)?;
        config.set_network_config(&NetworkConfig::from_json(network_config)?)?;
        self.init_with_config(config)
    }

    fn shutdown(&mut self) -> Result<(), ChainError> {
        self.table = None;
        Ok(())
    }

    fn create_table(&mut self, name: &str) -> Result<String, ChainError> {
        let config = self.config()?;
        let address = deploy_contract(
            self.runner.as_ref(),
            &config.script_path,
            &config.connection_url,
            &config.contract_path,
        )?;
        self.attach(name, &address)?;
        Ok(address)
    }

    fn load_table(&mut self, name: &str, address: &str) -> Result<(), ChainError> {
        let address = if address.is_empty() {
            self.config()?.contract_address.clone().ok_or_else(|| {
                ChainError::NotFound(format!("no contract address known for table {}", name))
            })?
        } else {
            address.to_string()
        };
        self.attach(name, &address)
    }

    /// Deployed contracts cannot be removed; the table is emptied instead.
    fn drop_table(&mut self) -> Result<(), ChainError> {
        let table = self.table()?;
        let keys: Vec<Bytes> = table.get_all()?.into_keys().collect();
        if !keys.is_empty() {
            table.delete(&keys)?;
        }
        Ok(())
    }

    fn put(&mut self, batch: &mut Batch) -> Result<(), ChainError> {
        let table = self.table()?;
        if batch.is_empty() {
            return Ok(());
        }
        table.put(batch)?;
        debug!("ethereum: put {} entries", batch.len());
        batch.clear();
        Ok(())
    }

    fn get(&self, key: &Bytes) -> Result<Bytes, ChainError> {
        self.table()?.get(key)
    }

    fn get_all(&self) -> Result<Batch, ChainError> {
        self.table()?.get_all()
    }

    fn remove(&mut self, key: &Bytes) -> Result<(), ChainError> {
        let table = self.table()?;
        // Probe first so a missing key is reported as such.
        table.get(key)?;
        table.delete(std::slice::from_ref(key))
    }

    fn bc_type(&self) -> BcType {
        BcType::Ethereum
    }
}
