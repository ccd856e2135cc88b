use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;
use serde_json;

#[derive(Clone, Deserialize, Debug, Parser)]
#[serde(default)]
pub struct CliConfig {
    /// Blockchain backend: ETHEREUM, FABRIC or STUB
    #[clap(short = 't', long = "bc_type", default_value = "STUB")]
    pub bc_type: String,
    /// Which interactive loop to run: manager or adapter
    #[clap(short = 'm', long = "mode", default_value = "manager")]
    pub mode: String,
    /// Backend configuration file (INI or JSON)
    #[clap(short = 'b', long = "bc_config", default_value = "config.ini")]
    pub bc_config: PathBuf,
    /// Log level
    #[clap(short = 'v', long = "log_level", default_value = "warn")]
    pub log_level: String,
    /// Network config JSON the adapter binds to, or `@<path>` to read it from a file
    #[clap(short = 'n', long = "network", default_value = "")]
    pub network: String,
    /// Optional script of commands to run instead of the interactive prompt
    #[clap(short = 's', long = "script", default_value = "")]
    pub script: String,
    /// Path to configuration file (if provided, it will override command-line args)
    #[clap(short = 'c', long = "config_file")]
    pub config_file: Option<PathBuf>,
}

impl Default for CliConfig {
    fn default() -> Self {
        CliConfig {
            bc_type: "STUB".to_owned(),
            mode: "manager".to_owned(),
            bc_config: "config.ini".into(),
            log_level: "warn".to_owned(),
            network: "".to_owned(),
            script: "".to_owned(),
            config_file: None,
        }
    }
}

impl CliConfig {
    pub fn new() -> Self {
        CliConfig::default()
    }

    /// Loads configuration from a JSON file, using default values for any unspecified options.
    pub fn from_file<P: AsRef<std::path::Path>>(path: P) -> std::io::Result<Self> {
        let mut file = File::open(&path)?;
        let mut contents = String::new();
        file.read_to_string(&mut contents)?;

        match serde_json::from_str(&contents) {
            Ok(config) => {
                debug!("Parsed cli config from path: {}", path.as_ref().display());
                Ok(config)
            }
            Err(e) => {
                warn!(
                    "Failed to parse cli config from path: {}",
                    path.as_ref().display()
                );
                Err(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
            }
        }
    }

    /// Parses command-line arguments. If a config file is given it takes full
    /// precedence, with unspecified fields defaulting.
    pub fn from_command_line() -> Self {
        let args_config = CliConfig::parse();

        if let Some(config_path) = &args_config.config_file {
            if let Ok(file_config) = Self::from_file(config_path) {
                let mut config = file_config;
                config.config_file = args_config.config_file.clone();
                return config;
            } else {
                eprintln!(
                    "Warning: Could not load config file: {}, falling back to command-line arguments",
                    config_path.display()
                );
            }
        }

        args_config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_cli_config_default() {
        let config = CliConfig::default();
        assert_eq!(config.bc_type, "STUB");
        assert_eq!(config.mode, "manager");
        assert_eq!(config.bc_config, PathBuf::from("config.ini"));
        assert_eq!(config.log_level, "warn");
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_cli_config_from_file_non_existant() {
        let result = CliConfig::from_file("/nonexistent/path/config.json");
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_config_from_file_partial() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "{{\"bc_type\": \"FABRIC\", \"mode\": \"adapter\"}}").unwrap();

        let config = CliConfig::from_file(file.path()).unwrap();
        assert_eq!(config.bc_type, "FABRIC");
        assert_eq!(config.mode, "adapter");
        assert_eq!(config.bc_config, PathBuf::from("config.ini"));
        assert_eq!(config.log_level, "warn");
    }

    #[test]
    fn test_cli_config_from_file_not_json() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "bc_type=STUB\nmode=adapter").unwrap();
        assert!(CliConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_cli_config_parse_args() {
        let config = CliConfig::parse_from([
            "chain-cli",
            "--bc_type",
            "ETHEREUM",
            "-m",
            "adapter",
            "-b",
            "/etc/chain.ini",
        ]);
        assert_eq!(config.bc_type, "ETHEREUM");
        assert_eq!(config.mode, "adapter");
        assert_eq!(config.bc_config, PathBuf::from("/etc/chain.ini"));
        assert!(config.network.is_empty());
    }
}
