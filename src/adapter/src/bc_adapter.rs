use std::path::Path;

use common::prelude::*;

/// Key/value access to one table hosted on a blockchain network.
///
/// An adapter is attached to at most one table at a time, selected with
/// `create_table` or `load_table`. Data operations without a table fail with
/// [`ChainError::InvalidOperation`].
pub trait BcAdapter {
    /// Reads the backend's static configuration.
    /// Fails if the file is unreadable, a required key is missing or the
    /// configured data location does not exist.
    fn init(&mut self, config_path: &Path) -> Result<(), ChainError>;

    /// Like [`BcAdapter::init`], then merges the per-network values from the
    /// JSON produced by a manager's `create_network`/`join_network`.
    fn init_with_network(&mut self, config_path: &Path, network_config: &str)
        -> Result<(), ChainError>;

    /// Detaches from the current table. Stored data is not touched.
    fn shutdown(&mut self) -> Result<(), ChainError>;

    /// Creates an empty table, attaches to it and returns its address.
    fn create_table(&mut self, name: &str) -> Result<String, ChainError>;

    /// Attaches to an existing table. Fails with [`ChainError::NotFound`]
    /// when there is no such table.
    fn load_table(&mut self, name: &str, address: &str) -> Result<(), ChainError>;

    /// Deletes all data of the current table.
    fn drop_table(&mut self) -> Result<(), ChainError>;

    /// Writes `batch`. Every entry that was durably written is removed from
    /// `batch`, so on error the remaining entries are the ones to retry.
    /// Writing a key again overwrites its value.
    fn put(&mut self, batch: &mut Batch) -> Result<(), ChainError>;

    /// Fails with [`ChainError::NotFound`] if `key` is absent.
    fn get(&self, key: &Bytes) -> Result<Bytes, ChainError>;

    /// All entries of the current table. An empty table gives an empty map.
    fn get_all(&self) -> Result<Batch, ChainError>;

    /// Fails with [`ChainError::NotFound`] if `key` is absent.
    fn remove(&mut self, key: &Bytes) -> Result<(), ChainError>;

    fn bc_type(&self) -> BcType;
}
