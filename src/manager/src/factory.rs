use std::sync::Arc;

use crate::bc_manager::BcManager;
use crate::ethereum::EthereumManager;
use crate::fabric::FabricManager;
use crate::stub::StubManager;
use common::prelude::*;

/// Builds an uninitialized manager for `bc_type` that runs commands through
/// the system shell.
pub fn create_manager(bc_type: BcType) -> Box<dyn BcManager> {
    create_manager_with_runner(bc_type, Arc::new(ShellRunner::new()))
}

pub fn create_manager_with_runner(
    bc_type: BcType,
    runner: Arc<dyn CommandRunner>,
) -> Box<dyn BcManager> {
    debug!("Creating {} manager", bc_type);
    match bc_type {
        BcType::Ethereum => Box::new(EthereumManager::new(runner)),
        BcType::Fabric => Box::new(FabricManager::new(runner)),
        BcType::Stub => Box::new(StubManager::new()),
    }
}
