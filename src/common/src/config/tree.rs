use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde_json::{Map, Value};

use crate::error::ChainError;

/// Hierarchical key/value configuration addressed by dotted paths
/// (`"Manager-Stub.stub-network-path"`).
///
/// Backed by a JSON object so the same tree can be loaded from an INI file
/// (one object per `[Section]`) or from JSON, and written back as JSON.
/// Leaf values written through [`ConfigTree::put`] are stored as strings;
/// typed getters accept both strings and JSON scalars.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigTree {
    root: Map<String, Value>,
}

impl ConfigTree {
    pub fn new() -> Self {
        ConfigTree::default()
    }

    /// Loads a file, choosing the JSON reader for `.json` files and the INI
    /// reader for anything else.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ChainError> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            ChainError::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        debug!("Loading config from {}", path.display());
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&contents),
            _ => Self::from_ini_str(&contents),
        }
    }

    /// Parses `[Section]` headers and `key = value` lines. `;` and `#` start
    /// comment lines. Keys before the first section land at the root.
    pub fn from_ini_str(contents: &str) -> Result<Self, ChainError> {
        let mut tree = ConfigTree::new();
        let mut section: Option<String> = None;
        for (lineno, raw) in contents.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with(';') || line.starts_with('#') {
                continue;
            }
            if let Some(rest) = line.strip_prefix('[') {
                let name = rest.strip_suffix(']').ok_or_else(|| {
                    ChainError::ConfigError(format!(
                        "line {}: unterminated section header",
                        lineno + 1
                    ))
                })?;
                let name = name.trim().to_string();
                tree.root
                    .entry(name.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                section = Some(name);
                continue;
            }
            let (key, value) = line.split_once('=').ok_or_else(|| {
                ChainError::ConfigError(format!(
                    "line {}: expected 'key = value', found '{}'",
                    lineno + 1,
                    line
                ))
            })?;
            let key = key.trim();
            if key.is_empty() {
                return Err(ChainError::ConfigError(format!(
                    "line {}: empty key",
                    lineno + 1
                )));
            }
            let value = unquote(value.trim());
            match &section {
                Some(s) => tree.put(&format!("{}.{}", s, key), value),
                None => tree.put(key, value),
            }
        }
        Ok(tree)
    }

    pub fn from_json_str(contents: &str) -> Result<Self, ChainError> {
        match serde_json::from_str::<Value>(contents)? {
            Value::Object(root) => Ok(ConfigTree { root }),
            other => Err(ChainError::SerializationError(format!(
                "expected a JSON object, found {}",
                other
            ))),
        }
    }

    /// Single-line JSON rendering.
    pub fn to_json_line(&self) -> String {
        Value::Object(self.root.clone()).to_string()
    }

    pub fn get_value(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.root.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get_value(path).is_some()
    }

    /// Returns the leaf at `path` as a string, or a config error naming the
    /// missing key.
    pub fn get_str(&self, path: &str) -> Result<String, ChainError> {
        match self.get_value(path) {
            Some(Value::String(s)) => Ok(s.clone()),
            Some(Value::Number(n)) => Ok(n.to_string()),
            Some(Value::Bool(b)) => Ok(b.to_string()),
            Some(other) => Err(ChainError::ConfigError(format!(
                "key '{}' is not a scalar: {}",
                path, other
            ))),
            None => Err(ChainError::ConfigError(format!("missing key '{}'", path))),
        }
    }

    pub fn get<T: FromStr>(&self, path: &str) -> Result<T, ChainError> {
        let raw = self.get_str(path)?;
        raw.trim().parse::<T>().map_err(|_| {
            ChainError::ConfigError(format!("key '{}' has invalid value '{}'", path, raw))
        })
    }

    /// Like [`ConfigTree::get`] but an absent key is `Ok(None)`.
    pub fn get_opt<T: FromStr>(&self, path: &str) -> Result<Option<T>, ChainError> {
        if self.contains(path) {
            self.get(path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Stores `value` as a string leaf, creating intermediate objects.
    /// A scalar sitting where an intermediate object is needed is replaced.
    pub fn put<V: ToString>(&mut self, path: &str, value: V) {
        let mut parts: Vec<&str> = path.split('.').collect();
        let leaf = match parts.pop() {
            Some(leaf) => leaf,
            None => return,
        };
        let mut current = &mut self.root;
        for part in parts {
            let entry = current
                .entry(part.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if !entry.is_object() {
                *entry = Value::Object(Map::new());
            }
            current = match entry.as_object_mut() {
                Some(map) => map,
                None => return,
            };
        }
        current.insert(leaf.to_string(), Value::String(value.to_string()));
    }

    pub fn remove(&mut self, path: &str) -> Option<Value> {
        let mut parts: Vec<&str> = path.split('.').collect();
        let leaf = parts.pop()?;
        let mut current = &mut self.root;
        for part in parts {
            current = current.get_mut(part)?.as_object_mut()?;
        }
        current.shift_remove(leaf)
    }
}

fn unquote(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2
        && ((bytes[0] == b'"' && bytes[bytes.len() - 1] == b'"')
            || (bytes[0] == b'\'' && bytes[bytes.len() - 1] == b'\''))
    {
        &value[1..value.len() - 1]
    } else {
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SAMPLE: &str = "\
; global comment
[Manager-Stub]
stub-network-path = /tmp/stub/

[Adapter-Stub]
data-path = \"/tmp/stub/\"
blocksize=5
";

    #[test]
    fn test_ini_sections() {
        let tree = ConfigTree::from_ini_str(SAMPLE).unwrap();
        assert_eq!(
            tree.get_str("Manager-Stub.stub-network-path").unwrap(),
            "/tmp/stub/"
        );
        assert_eq!(tree.get_str("Adapter-Stub.data-path").unwrap(), "/tmp/stub/");
        assert_eq!(tree.get::<u64>("Adapter-Stub.blocksize").unwrap(), 5);
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let tree = ConfigTree::from_ini_str(SAMPLE).unwrap();
        assert!(matches!(
            tree.get_str("Manager-Stub.nope"),
            Err(ChainError::ConfigError(_))
        ));
        assert!(matches!(
            tree.get::<u16>("Manager-Stub.stub-network-path"),
            Err(ChainError::ConfigError(_))
        ));
        assert_eq!(tree.get_opt::<u16>("Manager-Stub.port").unwrap(), None);
    }

    #[test]
    fn test_malformed_ini() {
        assert!(ConfigTree::from_ini_str("[Broken\nkey = v").is_err());
        assert!(ConfigTree::from_ini_str("[S]\njust a line").is_err());
    }

    #[test]
    fn test_put_and_json_line() {
        let mut tree = ConfigTree::new();
        tree.put("Network.id", "db");
        tree.put("Network.rpc-port", 8545);
        let json = tree.to_json_line();
        assert!(!json.contains('\n'));
        assert_eq!(json, r#"{"Network":{"id":"db","rpc-port":"8545"}}"#);

        let back = ConfigTree::from_json_str(&json).unwrap();
        assert_eq!(back.get::<u16>("Network.rpc-port").unwrap(), 8545);
        assert_eq!(back, tree);
    }

    #[test]
    fn test_json_numbers_are_readable() {
        let tree = ConfigTree::from_json_str(r#"{"Network":{"peer_port":7051}}"#).unwrap();
        assert_eq!(tree.get::<u16>("Network.peer_port").unwrap(), 7051);
        assert_eq!(tree.get_str("Network.peer_port").unwrap(), "7051");
        assert!(ConfigTree::from_json_str("[1,2]").is_err());
    }

    #[test]
    fn test_remove() {
        let mut tree = ConfigTree::new();
        tree.put("Network.id", "x");
        tree.put("Network.enode", "e");
        assert!(tree.remove("Network.enode").is_some());
        assert!(!tree.contains("Network.enode"));
        assert!(tree.contains("Network.id"));
        assert!(tree.remove("Nope.enode").is_none());
    }

    #[test]
    fn test_from_file_by_extension() {
        let mut ini = NamedTempFile::new().unwrap();
        write!(ini, "{}", SAMPLE).unwrap();
        let tree = ConfigTree::from_file(ini.path()).unwrap();
        assert!(tree.contains("Adapter-Stub.blocksize"));

        let mut json = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(json, r#"{{"Adapter-Stub": {{"blocksize": 3}}}}"#).unwrap();
        let tree = ConfigTree::from_file(json.path()).unwrap();
        assert_eq!(tree.get::<u64>("Adapter-Stub.blocksize").unwrap(), 3);

        assert!(matches!(
            ConfigTree::from_file("/nonexistent/config.ini"),
            Err(ChainError::ConfigError(_))
        ));
    }
}
