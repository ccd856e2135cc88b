use std::io::BufRead;
use std::path::{Path, PathBuf};

use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;

use crate::commands::{
    gen_help_string, parse_command, AdapterCommand, Command, CommandWithArgs, ManagerCommand,
    Mode, SessionCommand,
};
use adapter::BcAdapter;
use common::prelude::*;
use manager::BcManager;

/// Outcome of one command.
#[derive(Debug, PartialEq, Eq)]
pub enum Response {
    Ok(String),
    Err(String),
    Quit,
}

impl Response {
    pub fn is_ok(&self) -> bool {
        !matches!(self, Response::Err(_))
    }
}

enum Backend {
    Manager(Box<dyn BcManager>),
    Adapter(Box<dyn BcAdapter>),
}

/// One interactive session against a manager or an adapter.
pub struct Session {
    backend: Backend,
    bc_config: PathBuf,
    /// Config returned by the last create/join.
    network: Option<NetworkConfig>,
}

impl Session {
    pub fn with_manager(mut manager: Box<dyn BcManager>, bc_config: &Path) -> Result<Self, ChainError> {
        manager.init(bc_config)?;
        Ok(Session {
            backend: Backend::Manager(manager),
            bc_config: bc_config.to_path_buf(),
            network: None,
        })
    }

    /// Starts an adapter session. With a network config the adapter is bound
    /// to that network, otherwise it uses the static config alone.
    pub fn with_adapter(
        mut adapter: Box<dyn BcAdapter>,
        bc_config: &Path,
        network: Option<&str>,
    ) -> Result<Self, ChainError> {
        match network {
            Some(json) => adapter.init_with_network(bc_config, json)?,
            None => adapter.init(bc_config)?,
        }
        Ok(Session {
            backend: Backend::Adapter(adapter),
            bc_config: bc_config.to_path_buf(),
            network: None,
        })
    }

    pub fn mode(&self) -> Mode {
        match self.backend {
            Backend::Manager(_) => Mode::Manager,
            Backend::Adapter(_) => Mode::Adapter,
        }
    }

    pub fn network(&self) -> Option<&NetworkConfig> {
        self.network.as_ref()
    }

    /// Parses and runs one line.
    pub fn execute(&mut self, line: &str) -> Response {
        let line = line.trim();
        if line.is_empty() {
            return Response::Ok(String::new());
        }
        let request = match parse_command(line.to_string(), self.mode()) {
            Some(request) => request,
            None => {
                return Response::Err(format!(
                    "Unknown command: {}\n{}",
                    line,
                    gen_help_string(self.mode())
                ))
            }
        };
        debug!("cli: {:?}", request);
        let result = match &request.command {
            Command::Session(SessionCommand::Help) => Ok(gen_help_string(self.mode())),
            Command::Session(SessionCommand::Quit) => return self.quit(),
            Command::Manager(cmd) => self.run_manager(cmd.clone(), &request),
            Command::Adapter(cmd) => self.run_adapter(cmd.clone(), &request),
        };
        match result {
            Ok(msg) => Response::Ok(msg),
            Err(e) => {
                warn!("cli: '{}' failed: {}", line, e);
                Response::Err(e.to_string())
            }
        }
    }

    fn quit(&mut self) -> Response {
        let result = match &mut self.backend {
            Backend::Manager(m) => m.shutdown(),
            Backend::Adapter(a) => a.shutdown(),
        };
        if let Err(e) = result {
            warn!("cli: shutdown failed: {}", e);
        }
        Response::Quit
    }

    fn run_manager(
        &mut self,
        cmd: ManagerCommand,
        request: &CommandWithArgs,
    ) -> Result<String, ChainError> {
        let manager = match &mut self.backend {
            Backend::Manager(m) => m,
            Backend::Adapter(_) => return Err(c_err("not a manager session")),
        };
        match cmd {
            ManagerCommand::Create => {
                let name = arg(request, 0, "network name")?;
                let network = manager.create_network(name)?;
                let json = pretty(&network);
                self.network = Some(network);
                Ok(format!("Network created!\n{}", json))
            }
            ManagerCommand::Join => {
                let name = arg(request, 0, "network name")?;
                let mut network = NetworkConfig::from_json(arg(request, 1, "network config")?)?;
                manager.join_network(name, &mut network)?;
                let json = pretty(&network);
                self.network = Some(network);
                Ok(format!("Joined network!\n{}", json))
            }
            ManagerCommand::Leave => {
                let name = arg(request, 0, "network name")?;
                let mut network = match request.args.get(1) {
                    Some(json) => NetworkConfig::from_json(json)?,
                    None => self.network.clone().ok_or_else(|| {
                        ChainError::ConfigError("no network config to leave".to_string())
                    })?,
                };
                manager.leave_network(name, &mut network)?;
                self.network = None;
                Ok("Left the network!".to_string())
            }
            ManagerCommand::ShowConfig => Ok(self
                .network
                .as_ref()
                .map(pretty)
                .unwrap_or_else(|| "No network".to_string())),
        }
    }

    fn run_adapter(
        &mut self,
        cmd: AdapterCommand,
        request: &CommandWithArgs,
    ) -> Result<String, ChainError> {
        let adapter = match &mut self.backend {
            Backend::Adapter(a) => a,
            Backend::Manager(_) => return Err(c_err("not an adapter session")),
        };
        match cmd {
            AdapterCommand::Connect => {
                let json = arg(request, 0, "network config")?;
                adapter.init_with_network(&self.bc_config, json)?;
                Ok("Adapter initialized".to_string())
            }
            AdapterCommand::CreateTable => {
                let name = arg(request, 0, "table name")?;
                let address = adapter.create_table(name)?;
                Ok(format!("Created table {} with address {}", name, address))
            }
            AdapterCommand::LoadTable => {
                let name = arg(request, 0, "table name")?;
                let address = request.args.get(1).map(String::as_str).unwrap_or("");
                adapter.load_table(name, address)?;
                Ok(format!("Loaded table {}", name))
            }
            AdapterCommand::Put => {
                let key = arg(request, 0, "key")?;
                let value = arg(request, 1, "value")?;
                let mut batch = Batch::new();
                batch.insert(Bytes::from(key), Bytes::from(value));
                adapter.put(&mut batch)?;
                Ok(format!("Wrote key {}", key))
            }
            AdapterCommand::Get => {
                let key = arg(request, 0, "key")?;
                Ok(adapter.get(&Bytes::from(key))?.to_string())
            }
            AdapterCommand::TableScan => {
                let all = adapter.get_all()?;
                if all.is_empty() {
                    return Ok("Table is empty".to_string());
                }
                let rows: Vec<String> = all
                    .iter()
                    .map(|(k, v)| format!("{} -> {}", k, v))
                    .collect();
                Ok(rows.join("\n"))
            }
            AdapterCommand::Remove => {
                let key = arg(request, 0, "key")?;
                adapter.remove(&Bytes::from(key))?;
                Ok(format!("Removed key {}", key))
            }
            AdapterCommand::Drop => {
                adapter.drop_table()?;
                Ok("Table dropped".to_string())
            }
            AdapterCommand::Close => {
                adapter.shutdown()?;
                Ok("Table closed".to_string())
            }
        }
    }

    /// Runs every line of `reader` and stops at `quit`.
    pub fn run_script<R: BufRead>(&mut self, reader: R) -> Result<Vec<Response>, ChainError> {
        let mut responses = Vec::new();
        for line in reader.lines() {
            let response = self.execute(&line?);
            let quit = response == Response::Quit;
            responses.push(response);
            if quit {
                break;
            }
        }
        Ok(responses)
    }

    /// Interactive prompt until `quit`, Ctrl-C or Ctrl-D.
    pub fn run_cli(&mut self) -> Result<(), ChainError> {
        let mut rl = DefaultEditor::new().map_err(|e| ChainError::IOError(e.to_string()))?;
        println!("{}", gen_help_string(self.mode()));
        let prompt = match self.mode() {
            Mode::Manager => "manager> ",
            Mode::Adapter => "adapter> ",
        };
        loop {
            match rl.readline(prompt) {
                Ok(line) => {
                    if !line.trim().is_empty() {
                        let _ = rl.add_history_entry(line.as_str());
                    }
                    match self.execute(&line) {
                        Response::Ok(msg) => {
                            if !msg.is_empty() {
                                println!("{}", msg)
                            }
                        }
                        Response::Err(msg) => println!("Error: {}", msg),
                        Response::Quit => break,
                    }
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                    self.quit();
                    break;
                }
                Err(e) => return Err(ChainError::IOError(e.to_string())),
            }
        }
        Ok(())
    }
}

fn arg<'a>(request: &'a CommandWithArgs, idx: usize, what: &str) -> Result<&'a str, ChainError> {
    request
        .args
        .get(idx)
        .map(String::as_str)
        .ok_or_else(|| ChainError::InvalidOperation(format!("missing argument: {}", what)))
}

/// Indented JSON for display. Falls back to the compact form.
fn pretty(network: &NetworkConfig) -> String {
    let json = network.to_json();
    serde_json::from_str::<serde_json::Value>(&json)
        .and_then(|v| serde_json::to_string_pretty(&v))
        .unwrap_or(json)
}
