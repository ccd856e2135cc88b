#[macro_use]
extern crate log;

pub mod test_network;

pub use test_network::TestNetwork;
