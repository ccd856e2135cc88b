#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

pub mod commands;
mod session;


pub use session::{Response, Session};
