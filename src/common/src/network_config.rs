use std::fmt;
use std::str::FromStr;

use crate::config::ConfigTree;
use crate::error::ChainError;

const NETWORK_SECTION: &str = "Network";
const ID_KEY: &str = "id";

/// Everything another node needs to join a network, as produced by
/// `create_network` and updated by `join_network`.
///
/// Keys live under the `Network` object. The serialized form is a single
/// line of JSON, e.g. `{"Network":{"id":"db","network-name":"db"}}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NetworkConfig {
    tree: ConfigTree,
}

impl NetworkConfig {
    pub fn new(id: &str) -> Self {
        let mut config = NetworkConfig::default();
        config.set_id(id);
        config
    }

    pub fn from_json(json: &str) -> Result<Self, ChainError> {
        let tree = ConfigTree::from_json_str(json)?;
        if !tree.contains(NETWORK_SECTION) {
            return Err(ChainError::DecodeError(format!(
                "network config has no '{}' object",
                NETWORK_SECTION
            )));
        }
        Ok(NetworkConfig { tree })
    }

    pub fn to_json(&self) -> String {
        self.tree.to_json_line()
    }

    pub fn id(&self) -> Option<String> {
        self.tree.get_str(&Self::path(ID_KEY)).ok()
    }

    pub fn set_id(&mut self, id: &str) {
        self.set(ID_KEY, id);
    }

    pub fn get_str(&self, key: &str) -> Result<String, ChainError> {
        self.tree.get_str(&Self::path(key))
    }

    pub fn get<T: FromStr>(&self, key: &str) -> Result<T, ChainError> {
        self.tree.get(&Self::path(key))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.tree.contains(&Self::path(key))
    }

    pub fn set<V: ToString>(&mut self, key: &str, value: V) {
        self.tree.put(&Self::path(key), value);
    }

    pub fn remove(&mut self, key: &str) {
        self.tree.remove(&Self::path(key));
    }

    fn path(key: &str) -> String {
        format!("{}.{}", NETWORK_SECTION, key)
    }
}

impl fmt::Display for NetworkConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_json())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_and_json() {
        let mut config = NetworkConfig::new("db");
        config.set("network-name", "db");
        assert_eq!(config.id().as_deref(), Some("db"));
        assert_eq!(
            config.to_json(),
            r#"{"Network":{"id":"db","network-name":"db"}}"#
        );
    }

    #[test]
    fn test_parse_external() {
        let config =
            NetworkConfig::from_json(r#"{"Network": {"id": "n", "rpc-port": 8000}}"#).unwrap();
        assert_eq!(config.get::<u16>("rpc-port").unwrap(), 8000);
        assert!(config.get_str("enode").is_err());
        assert!(NetworkConfig::from_json(r#"{"Other": {}}"#).is_err());
        assert!(NetworkConfig::from_json("not json").is_err());
    }
}
