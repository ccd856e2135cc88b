use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::ContractClient;
use common::prelude::*;
use common::shell::shell_quote;

pub const SUBMIT_SCRIPT: &str = "submit.sh";
pub const CALL_SCRIPT: &str = "call.sh";
pub const DEPLOY_SCRIPT: &str = "deploy_contract.sh";

/// Reaches a geth node through the helper scripts in `script_path`.
///
/// `submit.sh <url> <contract> <max-wait> <function> <args..>` sends a
/// transaction and waits at most `max-wait` seconds for it to be mined.
/// `call.sh <url> <contract> <function> <args..>` runs a read-only call.
pub struct EthereumScriptClient {
    runner: Arc<dyn CommandRunner>,
    script_path: PathBuf,
    connection_url: String,
    contract_address: String,
    max_waiting_time: Duration,
}

impl EthereumScriptClient {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        script_path: &Path,
        connection_url: &str,
        contract_address: &str,
        max_waiting_time: Duration,
    ) -> Self {
        EthereumScriptClient {
            runner,
            script_path: script_path.to_path_buf(),
            connection_url: connection_url.to_string(),
            contract_address: contract_address.to_string(),
            max_waiting_time,
        }
    }

    fn script(&self, name: &str) -> String {
        shell_quote(&self.script_path.join(name).to_string_lossy())
    }

    fn quoted_args(args: &[String]) -> String {
        args.iter()
            .map(|a| shell_quote(a))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Deploys a fresh table contract and returns its address, the last line
/// the deploy script prints.
pub fn deploy_contract(
    runner: &dyn CommandRunner,
    script_path: &Path,
    connection_url: &str,
    contract_path: &str,
) -> Result<String, ChainError> {
    let cmd = format!(
        "bash {} {} {}",
        shell_quote(&script_path.join(DEPLOY_SCRIPT).to_string_lossy()),
        shell_quote(connection_url),
        shell_quote(contract_path)
    );
    let out = runner.exec_checked(&cmd)?;
    let address = out
        .lines()
        .last()
        .filter(|l| l.starts_with("0x"))
        .ok_or_else(|| {
            ChainError::DecodeError(format!(
                "deploy script printed no contract address: '{}'",
                out.stdout.trim()
            ))
        })?;
    info!("ethereum: deployed table contract at {}", address);
    Ok(address.to_string())
}

impl ContractClient for EthereumScriptClient {
    fn submit(&self, function: &str, args: &[String]) -> Result<String, ChainError> {
        let cmd = format!(
            "bash {} {} {} {} {} {}",
            self.script(SUBMIT_SCRIPT),
            shell_quote(&self.connection_url),
            shell_quote(&self.contract_address),
            self.max_waiting_time.as_secs(),
            shell_quote(function),
            Self::quoted_args(args)
        );
        let out = self.runner.exec_checked(&cmd).map_err(|e| match e {
            ChainError::CommandFailed(msg) if msg.contains("not mined") => ChainError::Timeout(msg),
            e => e,
        })?;
        Ok(out.stdout.trim().to_string())
    }

    fn evaluate(&self, function: &str, args: &[String]) -> Result<String, ChainError> {
        let cmd = format!(
            "bash {} {} {} {} {}",
            self.script(CALL_SCRIPT),
            shell_quote(&self.connection_url),
            shell_quote(&self.contract_address),
            shell_quote(function),
            Self::quoted_args(args)
        );
        Ok(self.runner.exec_checked(&cmd)?.stdout.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testutil::ScriptedRunner;

    #[test]
    fn test_deploy_reads_last_line() {
        let runner = ScriptedRunner::strict();
        runner.respond(
            DEPLOY_SCRIPT,
            ExecOutput::ok("compiling\nsent tx 0xaa\n0x5FbDB2315678afecb367f032d93F642f64180aa3\n"),
        );
        let address = deploy_contract(
            &runner,
            Path::new("/scripts"),
            "http://127.0.0.1:8545",
            "/contracts/Table.bin",
        )
        .unwrap();
        assert_eq!(address, "0x5FbDB2315678afecb367f032d93F642f64180aa3");

        let garbage = ScriptedRunner::strict();
        garbage.respond(DEPLOY_SCRIPT, ExecOutput::ok("error: out of gas\n"));
        assert!(matches!(
            deploy_contract(&garbage, Path::new("/s"), "u", "c"),
            Err(ChainError::DecodeError(_))
        ));
    }

    #[test]
    fn test_submit_and_call_commands() {
        let runner = Arc::new(ScriptedRunner::strict());
        runner.respond(SUBMIT_SCRIPT, ExecOutput::ok(""));
        runner.respond(CALL_SCRIPT, ExecOutput::ok("\"3131\"\n"));
        let client = EthereumScriptClient::new(
            runner.clone(),
            Path::new("/scripts"),
            "http://10.0.0.1:8545",
            "0xabc",
            Duration::from_secs(30),
        );
        client
            .submit("put", &["74".to_string(), "{\"41\":\"31\"}".to_string()])
            .unwrap();
        assert_eq!(
            client.evaluate("get", &["74".to_string(), "41".to_string()]).unwrap(),
            "\"3131\""
        );
        assert_eq!(
            runner.find(SUBMIT_SCRIPT).unwrap(),
            "bash '/scripts/submit.sh' 'http://10.0.0.1:8545' '0xabc' 30 'put' '74' '{\"41\":\"31\"}'"
        );
    }

    #[test]
    fn test_unmined_transaction_times_out() {
        let runner = Arc::new(ScriptedRunner::strict());
        runner.respond(SUBMIT_SCRIPT, ExecOutput::failed("transaction not mined within 30s"));
        let client = EthereumScriptClient::new(
            runner,
            Path::new("/scripts"),
            "http://10.0.0.1:8545",
            "0xabc",
            Duration::from_secs(30),
        );
        assert!(matches!(
            client.submit("delete", &["74".to_string(), "[]".to_string()]),
            Err(ChainError::Timeout(_))
        ));
    }
}
