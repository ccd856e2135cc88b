#[macro_use]
extern crate log;

mod bc_manager;
pub mod ethereum;
pub mod fabric;
pub mod factory;
pub mod peer_info;
pub mod ports;
pub mod stub;


pub use bc_manager::BcManager;
pub use factory::{create_manager, create_manager_with_runner};

pub mod prelude {
    pub use crate::bc_manager::BcManager;
    pub use crate::factory::create_manager;
    pub use common::prelude::*;
}
