use std::sync::Arc;

use crate::bc_adapter::BcAdapter;
use crate::ethereum::EthereumAdapter;
use crate::fabric::FabricAdapter;
use crate::stub::StubAdapter;
use common::prelude::*;

/// Builds an uninitialized adapter for `bc_type`.
pub fn create_adapter(bc_type: BcType) -> Box<dyn BcAdapter> {
    create_adapter_with_runner(bc_type, Arc::new(ShellRunner::new()))
}

pub fn create_adapter_with_runner(
    bc_type: BcType,
    runner: Arc<dyn CommandRunner>,
) -> Box<dyn BcAdapter> {
    debug!("Creating {} adapter", bc_type);
    match bc_type {
        BcType::Ethereum => Box::new(EthereumAdapter::new(runner)),
        BcType::Fabric => Box::new(FabricAdapter::new(runner)),
        BcType::Stub => Box::new(StubAdapter::new()),
    }
}
