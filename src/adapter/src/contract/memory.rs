use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use super::ContractClient;
use common::prelude::*;

/// In-memory contract speaking the wire protocol.
#[derive(Default, Clone)]
pub struct MemoryContract {
    tables: Arc<Mutex<BTreeMap<String, BTreeMap<String, String>>>>,
    offline: Arc<Mutex<bool>>,
}

impl ContractClient for MemoryContract {
    fn submit(&self, function: &str, args: &[String]) -> Result<String, ChainError> {
        if *self.offline.lock().unwrap() {
            return Err(ChainError::CommandFailed("connection refused".to_string()));
        }
        let mut tables = self.tables.lock().unwrap();
        let table = tables.entry(args[0].clone()).or_default();
        match function {
            "put" => {
                let entries: BTreeMap<String, String> = serde_json::from_str(&args[1])?;
                table.extend(entries);
            }
            "delete" => {
                let keys: Vec<String> = serde_json::from_str(&args[1])?;
                if keys.iter().any(|k| !table.contains_key(k)) {
                    return Err(ChainError::CommandFailed("Key not found".to_string()));
                }
                for k in keys {
                    table.remove(&k);
                }
            }
            f => return Err(ChainError::CommandFailed(format!("unknown function {}", f))),
        }
        Ok(String::new())
    }

    fn evaluate(&self, function: &str, args: &[String]) -> Result<String, ChainError> {
        let tables = self.tables.lock().unwrap();
        let empty = BTreeMap::new();
        let table = tables.get(&args[0]).unwrap_or(&empty);
        match function {
            "get" => table.get(&args[1]).cloned().ok_or_else(|| {
                ChainError::CommandFailed(format!("Key {} does not exist", args[1]))
            }),
            "getAll" => Ok(serde_json::to_string(table)?),
            f => Err(ChainError::CommandFailed(format!("unknown function {}", f))),
        }
    }
}

impl MemoryContract {
    /// While offline every submit fails.
    pub fn set_offline(&self, offline: bool) {
        *self.offline.lock().unwrap() = offline;
    }

    /// Snapshot of one table's hex-encoded entries.
    pub fn entries(&self, table_hex: &str) -> BTreeMap<String, String> {
        self.tables
            .lock()
            .unwrap()
            .get(table_hex)
            .cloned()
            .unwrap_or_default()
    }
}
