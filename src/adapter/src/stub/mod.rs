pub mod block_number;
pub mod table_store;

use std::path::{Path, PathBuf};

use crate::bc_adapter::BcAdapter;
use block_number::BlockNumber;
use common::prelude::*;
use table_store::{HexLineFile, TableStore};

pub const ADAPTER_SECTION: &str = "Adapter-Stub";
const KEY_NETWORK_NAME: &str = "network-name";

#[derive(Debug, Clone, PartialEq)]
pub struct StubAdapterConfig {
    /// Directory holding the table files of the network.
    pub data_path: PathBuf,
    /// Transactions per simulated block.
    pub blocksize: u64,
}

impl FromConfigTree for StubAdapterConfig {
    fn from_tree(tree: &ConfigTree) -> Result<Self, ChainError> {
        let key = |k: &str| format!("{}.{}", ADAPTER_SECTION, k);
        Ok(StubAdapterConfig {
            data_path: tree.get_str(&key("data-path"))?.into(),
            blocksize: tree.get(&key("blocksize"))?,
        })
    }
}

impl StubAdapterConfig {
    /// Narrows the data path to the directory of the given network.
    pub fn set_network_config(&mut self, network: &NetworkConfig) -> Result<(), ChainError> {
        let name = network.get_str(KEY_NETWORK_NAME)?;
        self.data_path = self.data_path.join(name);
        Ok(())
    }
}

/// Lock evidence attached to signed requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockProof {
    pub signature: String,
    pub transaction_id: u64,
    pub node_id: u64,
    /// Last block for which the lock is valid.
    pub block_timeout: u64,
}

impl LockProof {
    /// Text the signature is computed over: `key#transaction#node#timeout`.
    pub fn plaintext(&self, key: &Bytes) -> String {
        format!(
            "{}#{}#{}#{}",
            key, self.transaction_id, self.node_id, self.block_timeout
        )
    }
}

pub trait SignatureVerifier {
    fn verify(&self, key: &Bytes, proof: &LockProof) -> bool;
}

/// Accepts every signature. Stub networks have no key material to check
/// against.
pub struct AcceptAllSignatures;

impl SignatureVerifier for AcceptAllSignatures {
    fn verify(&self, key: &Bytes, proof: &LockProof) -> bool {
        trace!("stub: accepting signature over '{}'", proof.plaintext(key));
        true
    }
}

/// Filesystem stand-in for a ledger: each table is a [`HexLineFile`] in the
/// network's data directory, and every successful write advances the
/// simulated [`BlockNumber`].
pub struct StubAdapter {
    config: Option<StubAdapterConfig>,
    block_number: Option<BlockNumber>,
    table: Option<HexLineFile>,
    verifier: Box<dyn SignatureVerifier>,
}

impl Default for StubAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl StubAdapter {
    pub fn new() -> Self {
        StubAdapter {
            config: None,
            block_number: None,
            table: None,
            verifier: Box::new(AcceptAllSignatures),
        }
    }

    pub fn with_verifier(mut self, verifier: Box<dyn SignatureVerifier>) -> Self {
        self.verifier = verifier;
        self
    }

    /// Initializes from an already built config.
    pub fn init_with_config(&mut self, config: StubAdapterConfig) -> Result<(), ChainError> {
        if !config.data_path.is_dir() {
            return Err(ChainError::ConfigError(format!(
                "data path {} does not exist",
                config.data_path.display()
            )));
        }
        let block_number = BlockNumber::new(&config.data_path, config.blocksize)?;
        block_number.init()?;
        debug!("stub: initialized at {}", config.data_path.display());
        self.block_number = Some(block_number);
        self.config = Some(config);
        self.table = None;
        Ok(())
    }

    pub fn current_block_number(&self) -> Result<u64, ChainError> {
        self.blocks()?.get()
    }

    fn data_path(&self) -> Result<&Path, ChainError> {
        self.config
            .as_ref()
            .map(|c| c.data_path.as_path())
            .ok_or_else(|| ChainError::InvalidOperation("stub adapter is not initialized".to_string()))
    }

    fn blocks(&self) -> Result<&BlockNumber, ChainError> {
        self.block_number
            .as_ref()
            .ok_or_else(|| ChainError::InvalidOperation("stub adapter is not initialized".to_string()))
    }

    fn table(&self) -> Result<&HexLineFile, ChainError> {
        self.table
            .as_ref()
            .ok_or_else(|| ChainError::InvalidOperation("no table loaded".to_string()))
    }

    fn check_lock(&self, key: &Bytes, proof: &LockProof) -> Result<(), ChainError> {
        if !self.verifier.verify(key, proof) {
            return Err(ChainError::InvalidOperation(format!(
                "invalid signature for transaction {}",
                proof.transaction_id
            )));
        }
        if self.blocks()?.has_lock_timed_out(proof.block_timeout)? {
            return Err(ChainError::Timeout(format!(
                "lock of transaction {} is bound to block {}",
                proof.transaction_id, proof.block_timeout
            )));
        }
        Ok(())
    }

    pub fn put_signed(
        &mut self,
        key: &Bytes,
        value: &Bytes,
        proof: &LockProof,
    ) -> Result<(), ChainError> {
        self.check_lock(key, proof)?;
        let mut batch = Batch::new();
        batch.insert(key.clone(), value.clone());
        self.put(&mut batch)
    }

    pub fn get_signed(&self, key: &Bytes, proof: &LockProof) -> Result<Bytes, ChainError> {
        self.check_lock(key, proof)?;
        self.get(key)
    }

    pub fn remove_signed(&mut self, key: &Bytes, proof: &LockProof) -> Result<(), ChainError> {
        self.check_lock(key, proof)?;
        self.remove(key)
    }
}

impl BcAdapter for StubAdapter {
    fn init(&mut self, config_path: &Path) -> Result<(), ChainError> {
        self.init_with_config(StubAdapterConfig::from_config_file(config_path)?)
    }

    fn init_with_network(
        &mut self,
        config_path: &Path,
        network_config: &str,
    ) -> Result<(), ChainError> {
        let mut config = StubAdapterConfig::from_config_file(config_path)?;
        config.set_network_config(&NetworkConfig::from_json(network_config)?)?;
        self.init_with_config(config)
    }

    fn shutdown(&mut self) -> Result<(), ChainError> {
        self.table = None;
        Ok(())
    }

    fn create_table(&mut self, name: &str) -> Result<String, ChainError> {
        let table = HexLineFile::for_table(self.data_path()?, name)?;
        table.create()?;
        let address = table.location();
        debug!("stub: created table {} at {}", name, address);
        self.table = Some(table);
        Ok(address)
    }

    fn load_table(&mut self, name: &str, _address: &str) -> Result<(), ChainError> {
        let table = HexLineFile::for_table(self.data_path()?, name)?;
        if !table.exists() {
            return Err(ChainError::NotFound(format!("table {} does not exist", name)));
        }
        self.table = Some(table);
        Ok(())
    }

    fn drop_table(&mut self) -> Result<(), ChainError> {
        self.table()?.destroy()?;
        debug!("stub: dropped table {}", self.table()?.location());
        Ok(())
    }

    fn put(&mut self, batch: &mut Batch) -> Result<(), ChainError> {
        let table = self.table()?;
        if batch.is_empty() {
            return Ok(());
        }
        table.put_batch(batch)?;
        trace!("stub: wrote {} entries", batch.len());
        batch.clear();
        self.blocks()?.increment_transaction_count()
    }

    fn get(&self, key: &Bytes) -> Result<Bytes, ChainError> {
        self.table()?
            .get(key)?
            .ok_or_else(|| ChainError::NotFound(format!("no value for key {:?}", key)))
    }

    fn get_all(&self) -> Result<Batch, ChainError> {
        self.table()?.scan()
    }

    fn remove(&mut self, key: &Bytes) -> Result<(), ChainError> {
        if !self.table()?.remove(key)? {
            return Err(ChainError::NotFound(format!("no value for key {:?}", key)));
        }
        self.blocks()?.increment_transaction_count()
    }

    fn bc_type(&self) -> BcType {
        BcType::Stub
    }
}
