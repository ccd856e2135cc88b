#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

mod bc_adapter;
pub mod contract;
pub mod ethereum;
pub mod fabric;
pub mod factory;
pub mod stub;

#[cfg(test)]
mod fabric_tests;

pub use bc_adapter::BcAdapter;
pub use factory::{create_adapter, create_adapter_with_runner};

pub mod prelude {
    pub use crate::bc_adapter::BcAdapter;
    pub use crate::factory::create_adapter;
    pub use common::prelude::*;
}
