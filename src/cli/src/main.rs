#[macro_use]
extern crate log;

use std::fs::{self, File};
use std::io::BufReader;

use adapter::create_adapter;
use cli::commands::Mode;
use cli::{Response, Session};
use common::config::cli::CliConfig;
use common::logging::init_logger;
use common::prelude::*;
use manager::create_manager;

fn main() {
    let config = CliConfig::from_command_line();
    init_logger(&config.log_level);
    if let Err(e) = run(&config) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

/// `--network` holds either the JSON itself or `@<path>` to a file with it.
fn network_arg(raw: &str) -> Result<Option<String>, ChainError> {
    match raw.trim() {
        "" => Ok(None),
        s => match s.strip_prefix('@') {
            Some(path) => Ok(Some(fs::read_to_string(path)?)),
            None => Ok(Some(s.to_string())),
        },
    }
}

fn run(config: &CliConfig) -> Result<(), ChainError> {
    let bc_type: BcType = config.bc_type.parse()?;
    let mode: Mode = config.mode.parse().map_err(ChainError::ConfigError)?;
    info!("Starting {} {:?} with {}", bc_type, mode, config.bc_config.display());

    let mut session = match mode {
        Mode::Manager => Session::with_manager(create_manager(bc_type), &config.bc_config)?,
        Mode::Adapter => Session::with_adapter(
            create_adapter(bc_type),
            &config.bc_config,
            network_arg(&config.network)?.as_deref(),
        )?,
    };

    if config.script.is_empty() {
        return session.run_cli();
    }
    let script = File::open(&config.script)?;
    for response in session.run_script(BufReader::new(script))? {
        match response {
            Response::Ok(msg) if !msg.is_empty() => println!("{}", msg),
            Response::Err(msg) => eprintln!("Error: {}", msg),
            _ => {}
        }
    }
    Ok(())
}
