#[macro_use]
extern crate serde;
#[macro_use]
extern crate log;

pub mod bc_type;
pub mod bytes;
pub mod config;
pub mod error;
pub mod logging;
pub mod network_config;
pub mod shell;
pub mod util;

pub use util::common_test_util as testutil;

pub mod prelude {
    pub use crate::bc_type::BcType;
    pub use crate::bytes::{Batch, Bytes};
    pub use crate::config::{ConfigTree, FromConfigTree};
    pub use crate::error::{c_err, ChainError};
    pub use crate::network_config::NetworkConfig;
    pub use crate::shell::{CommandRunner, ExecOutput, ShellRunner};
}
