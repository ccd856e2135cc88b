pub mod membership;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::bc_manager::BcManager;
use common::prelude::*;
use membership::{DirLock, LockGuard, MemberStore, MembersFile, LOCK_DIR, MEMBERS_FILE};

pub const MANAGER_SECTION: &str = "Manager-Stub";
pub const KEY_NETWORK_NAME: &str = "network-name";

const DEFAULT_LOCK_RETRIES: u32 = 10;
const DEFAULT_LOCK_BACKOFF: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, PartialEq)]
pub struct StubManagerConfig {
    /// Directory holding one sub-directory per network.
    pub stub_network_path: PathBuf,
    pub lock_retries: u32,
    pub lock_backoff: Duration,
}

impl StubManagerConfig {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        StubManagerConfig {
            stub_network_path: root.as_ref().to_path_buf(),
            lock_retries: DEFAULT_LOCK_RETRIES,
            lock_backoff: DEFAULT_LOCK_BACKOFF,
        }
    }
}

impl FromConfigTree for StubManagerConfig {
    fn from_tree(tree: &ConfigTree) -> Result<Self, ChainError> {
        let key = |k: &str| format!("{}.{}", MANAGER_SECTION, k);
        Ok(StubManagerConfig {
            stub_network_path: tree.get_str(&key("stub-network-path"))?.into(),
            lock_retries: tree
                .get_opt(&key("lock-retries"))?
                .unwrap_or(DEFAULT_LOCK_RETRIES),
            lock_backoff: tree
                .get_opt::<u64>(&key("lock-backoff-ms"))?
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_LOCK_BACKOFF),
        })
    }
}

/// Simulates networks with directories: `<root>/<name>/` holds a
/// `config.ini` with the member count, and the network is deleted when the
/// last member leaves. Counter updates are serialized through the
/// `directory_mutex` lock directory.
#[derive(Default)]
pub struct StubManager {
    config: Option<StubManagerConfig>,
}

impl StubManager {
    pub fn new() -> Self {
        StubManager::default()
    }

    pub fn with_config(config: StubManagerConfig) -> Self {
        StubManager {
            config: Some(config),
        }
    }

    fn config(&self) -> Result<&StubManagerConfig, ChainError> {
        self.config.as_ref().ok_or_else(|| {
            ChainError::InvalidOperation("stub manager is not initialized".to_string())
        })
    }

    fn network_dir(&self, name: &str) -> Result<PathBuf, ChainError> {
        if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\\']) {
            return Err(ChainError::InvalidOperation(format!(
                "'{}' is not a valid network name",
                name
            )));
        }
        Ok(self.config()?.stub_network_path.join(name))
    }

    /// Adds `delta` to the member count of `name` and returns the new count.
    /// The network directory is removed once the count drops below one.
    fn update_members(&self, name: &str, delta: i64) -> Result<i64, ChainError> {
        let config = self.config()?;
        let dir = self.network_dir(name)?;
        let store = MembersFile::new(dir.join(MEMBERS_FILE));
        if !dir.is_dir() || !store.exists() {
            return Err(ChainError::NotFound(format!("network {} does not exist", name)));
        }

        let lock = DirLock::new(dir.join(LOCK_DIR));
        let guard = LockGuard::acquire(&lock, config.lock_retries, config.lock_backoff)?;

        let count = store.read()?;
        if count < 1 {
            return Err(ChainError::DecodeError(format!(
                "network {} has invalid member count {}",
                name, count
            )));
        }
        let updated = count + delta;
        store.write(updated)?;
        debug!("StubManager: {} members {} -> {}", name, count, updated);

        if updated < 1 {
            fs::remove_dir_all(&dir)?;
            guard.disarm();
            info!("StubManager: last member left, removed network {}", name);
        }
        Ok(updated)
    }
}

/// Creates the network directory with a single member. The directory is
/// removed again when the count cannot be written.
pub(crate) fn provision_network(dir: &Path, store: &dyn MemberStore) -> Result<(), ChainError> {
    fs::create_dir(dir)?;
    if let Err(e) = store.write(1) {
        if let Err(cleanup) = fs::remove_dir_all(dir) {
            warn!("StubManager: could not remove {}: {}", dir.display(), cleanup);
        }
        return Err(e);
    }
    Ok(())
}

impl BcManager for StubManager {
    fn init(&mut self, config_path: &Path) -> Result<(), ChainError> {
        let config = StubManagerConfig::from_config_file(config_path)?;
        if !config.stub_network_path.is_dir() {
            return Err(ChainError::ConfigError(format!(
                "stub network path {} does not exist",
                config.stub_network_path.display()
            )));
        }
        self.config = Some(config);
        Ok(())
    }

    fn shutdown(&mut self) -> Result<(), ChainError> {
        Ok(())
    }

    fn create_network(&mut self, name: &str) -> Result<NetworkConfig, ChainError> {
        let dir = self.network_dir(name)?;
        if dir.exists() {
            return Err(ChainError::AlreadyExists(format!(
                "network directory {} already exists",
                dir.display()
            )));
        }
        provision_network(&dir, &MembersFile::new(dir.join(MEMBERS_FILE)))?;
        info!("StubManager: created network {} at {}", name, dir.display());

        let mut network = NetworkConfig::new(name);
        network.set(KEY_NETWORK_NAME, name);
        Ok(network)
    }

    fn join_network(&mut self, _name: &str, network: &mut NetworkConfig) -> Result<(), ChainError> {
        let network_name = network.get_str(KEY_NETWORK_NAME)?;
        self.update_members(&network_name, 1)?;
        Ok(())
    }

    fn leave_network(&mut self, _name: &str, network: &mut NetworkConfig) -> Result<(), ChainError> {
        let network_name = network.get_str(KEY_NETWORK_NAME)?;
        self.update_members(&network_name, -1)?;
        Ok(())
    }

    fn bc_type(&self) -> BcType {
        BcType::Stub
    }
}
