//! The table contract protocol shared by the ledger backends.
//!
//! A deployed contract hosts any number of tables, each addressed by the hex
//! encoding of its name. Keys and values travel hex encoded as well:
//!
//! * `put(table, {hexkey: hexvalue, ..})`
//! * `get(table, hexkey) -> hexvalue`
//! * `getAll(table) -> {hexkey: hexvalue, ..}`
//! * `delete(table, [hexkey, ..])`, which fails if any key is missing.

pub mod ethereum_client;
pub mod fabric_client;
#[cfg(test)]
pub(crate) mod memory;

use std::collections::BTreeMap;

use common::prelude::*;

pub use ethereum_client::EthereumScriptClient;
pub use fabric_client::{FabricConnection, PeerCliClient};

/// Transport to a deployed contract.
pub trait ContractClient: Send + Sync {
    /// Runs `function` as an ordered transaction and returns its result.
    fn submit(&self, function: &str, args: &[String]) -> Result<String, ChainError>;

    /// Runs `function` read-only against the current ledger state.
    fn evaluate(&self, function: &str, args: &[String]) -> Result<String, ChainError>;
}

/// One table behind a contract.
pub struct ContractTable {
    table_hex: String,
    client: Box<dyn ContractClient>,
}

impl ContractTable {
    pub fn new(table_name: &str, client: Box<dyn ContractClient>) -> Self {
        ContractTable {
            table_hex: hex::encode(table_name),
            client,
        }
    }

    pub fn table_hex(&self) -> &str {
        &self.table_hex
    }

    pub fn put(&self, batch: &Batch) -> Result<(), ChainError> {
        let entries: BTreeMap<String, String> = batch
            .iter()
            .map(|(k, v)| (k.to_hex(), v.to_hex()))
            .collect();
        let json = serde_json::to_string(&entries)?;
        self.client
            .submit("put", &[self.table_hex.clone(), json])
            .map(|_| ())
    }

    pub fn get(&self, key: &Bytes) -> Result<Bytes, ChainError> {
        let out = self
            .client
            .evaluate("get", &[self.table_hex.clone(), key.to_hex()])
            .map_err(|e| missing_key(e, key))?;
        Bytes::from_hex(unquote(&out))
    }

    pub fn get_all(&self) -> Result<Batch, ChainError> {
        let out = self.client.evaluate("getAll", &[self.table_hex.clone()])?;
        let out = out.trim();
        if out.is_empty() {
            return Ok(Batch::new());
        }
        let entries: BTreeMap<String, String> = serde_json::from_str(out)?;
        entries
            .iter()
            .map(|(k, v)| Ok((Bytes::from_hex(k)?, Bytes::from_hex(v)?)))
            .collect()
    }

    pub fn delete(&self, keys: &[Bytes]) -> Result<(), ChainError> {
        let hex_keys: Vec<String> = keys.iter().map(Bytes::to_hex).collect();
        let json = serde_json::to_string(&hex_keys)?;
        self.client
            .submit("delete", &[self.table_hex.clone(), json])
            .map(|_| ())
    }
}

/// Contracts report an absent key as a failed call.
fn missing_key(err: ChainError, key: &Bytes) -> ChainError {
    match err {
        ChainError::CommandFailed(msg) => {
            let lower = msg.to_lowercase();
            if lower.contains("not found") || lower.contains("does not exist") {
                ChainError::NotFound(format!("no value for key {:?}", key))
            } else {
                ChainError::CommandFailed(msg)
            }
        }
        e => e,
    }
}

fn unquote(s: &str) -> &str {
    let s = s.trim();
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use super::memory::MemoryContract;
    use super::*;

    fn kv(k: &str, v: &str) -> (Bytes, Bytes) {
        (Bytes::from(k), Bytes::from(v))
    }

    #[test]
    fn test_contract_table_protocol() {
        let contract = MemoryContract::default();
        let table = ContractTable::new("t", Box::new(contract.clone()));
        assert_eq!(table.table_hex(), "74");

        let batch: Batch = vec![kv("AAAA", "1111"), kv("b", "2")].into_iter().collect();
        table.put(&batch).unwrap();
        assert_eq!(contract.entries("74")["41414141"], "31313131");
        assert_eq!(table.get(&Bytes::from("AAAA")).unwrap(), Bytes::from("1111"));
        assert_eq!(table.get_all().unwrap(), batch);

        table.delete(&[Bytes::from("b")]).unwrap();
        assert!(matches!(
            table.get(&Bytes::from("b")),
            Err(ChainError::NotFound(_))
        ));
        assert!(table.delete(&[Bytes::from("b")]).is_err());
    }

    #[test]
    fn test_tables_are_separate() {
        let contract = MemoryContract::default();
        let t1 = ContractTable::new("t1", Box::new(contract.clone()));
        let t2 = ContractTable::new("t2", Box::new(contract));
        t1.put(&vec![kv("k", "v")].into_iter().collect()).unwrap();
        assert!(t2.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_response_shapes() {
        assert_eq!(unquote(" \"6869\"\n"), "6869");
        assert_eq!(unquote("6869"), "6869");
        let other = missing_key(
            ChainError::CommandFailed("connection refused".to_string()),
            &Bytes::from("k"),
        );
        assert!(matches!(other, ChainError::CommandFailed(_)));
    }
}
