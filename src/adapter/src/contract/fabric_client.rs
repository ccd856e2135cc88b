use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::ContractClient;
use common::prelude::*;
use common::shell::shell_quote;

const ORDERER_HOST: &str = "orderer.example.com";
const ORDERER_CA: &str =
    "organizations/ordererOrganizations/example.com/orderers/orderer.example.com/msp/tlscacerts/tlsca.example.com-cert.pem";

/// Everything needed to reach a peer of a test-network channel.
#[derive(Debug, Clone, PartialEq)]
pub struct FabricConnection {
    pub channel: String,
    pub contract: String,
    pub msp_id: String,
    /// Directory of the identity's MSP (parent of `signcerts` and `keystore`).
    pub msp_dir: PathBuf,
    pub tls_cert_path: PathBuf,
    pub peer_endpoint: String,
    pub gateway_peer: String,
    pub orderer_endpoint: String,
    pub test_network_path: PathBuf,
}

#[derive(Serialize)]
struct Invocation<'a> {
    function: &'a str,
    #[serde(rename = "Args")]
    args: &'a [String],
}

/// Talks to the contract through the `peer chaincode` CLI.
pub struct PeerCliClient {
    runner: Arc<dyn CommandRunner>,
    conn: FabricConnection,
    /// How long an invoke keeps being retried while the peer is unavailable.
    invoke_timeout: Duration,
}

impl PeerCliClient {
    pub fn new(runner: Arc<dyn CommandRunner>, conn: FabricConnection) -> Self {
        PeerCliClient {
            runner,
            conn,
            invoke_timeout: Duration::ZERO,
        }
    }

    pub fn with_invoke_timeout(mut self, timeout: Duration) -> Self {
        self.invoke_timeout = timeout;
        self
    }

    fn env(&self) -> String {
        format!(
            "CORE_PEER_TLS_ENABLED=true CORE_PEER_LOCALMSPID={} CORE_PEER_MSPCONFIGPATH={} \
             CORE_PEER_TLS_ROOTCERT_FILE={} CORE_PEER_ADDRESS={}",
            shell_quote(&self.conn.msp_id),
            quote_path(&self.conn.msp_dir),
            quote_path(&self.conn.tls_cert_path),
            shell_quote(&self.conn.peer_endpoint),
        )
    }

    fn ctor(function: &str, args: &[String]) -> Result<String, ChainError> {
        Ok(shell_quote(&serde_json::to_string(&Invocation {
            function,
            args,
        })?))
    }

    pub fn query_cmd(&self, function: &str, args: &[String]) -> Result<String, ChainError> {
        Ok(format!(
            "{} peer chaincode query -C {} -n {} -c {}",
            self.env(),
            shell_quote(&self.conn.channel),
            shell_quote(&self.conn.contract),
            Self::ctor(function, args)?
        ))
    }

    pub fn invoke_cmd(&self, function: &str, args: &[String]) -> Result<String, ChainError> {
        Ok(format!(
            "{} peer chaincode invoke -o {} --ordererTLSHostnameOverride {} --tls --cafile {} \
             -C {} -n {} --peerAddresses {} --tlsRootCertFiles {} --waitForEvent -c {}",
            self.env(),
            shell_quote(&self.conn.orderer_endpoint),
            ORDERER_HOST,
            quote_path(&self.conn.test_network_path.join(ORDERER_CA)),
            shell_quote(&self.conn.channel),
            shell_quote(&self.conn.contract),
            shell_quote(&self.conn.peer_endpoint),
            quote_path(&self.conn.tls_cert_path),
            Self::ctor(function, args)?
        ))
    }
}

impl ContractClient for PeerCliClient {
    fn submit(&self, function: &str, args: &[String]) -> Result<String, ChainError> {
        let cmd = self.invoke_cmd(function, args)?;
        let out = if self.invoke_timeout.is_zero() {
            self.runner.exec_checked(&cmd)
        } else {
            self.runner
                .retry_checked(&cmd, self.invoke_timeout)
                .map_err(|e| match e {
                    ChainError::Timeout(msg) => ChainError::CommandFailed(msg),
                    e => e,
                })
        }?;
        debug!("fabric: {} on {} committed", function, self.conn.gateway_peer);
        Ok(out.stdout.trim().to_string())
    }

    fn evaluate(&self, function: &str, args: &[String]) -> Result<String, ChainError> {
        let out = self.runner.exec_checked(&self.query_cmd(function, args)?)?;
        Ok(out.stdout.trim().to_string())
    }
}

fn quote_path(p: &Path) -> String {
    shell_quote(&p.to_string_lossy())
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::testutil::ScriptedRunner;

    fn connection() -> FabricConnection {
        FabricConnection {
            channel: "ch".to_string(),
            contract: "ch".to_string(),
            msp_id: "Org1MSP".to_string(),
            msp_dir: "/net/users/User1/msp".into(),
            tls_cert_path: "/net/peers/p0/tls/ca.crt".into(),
            peer_endpoint: "localhost:7051".to_string(),
            gateway_peer: "p0".to_string(),
            orderer_endpoint: "localhost:7050".to_string(),
            test_network_path: "/net".into(),
        }
    }

    #[test]
    fn test_query_command() {
        let runner = Arc::new(ScriptedRunner::strict());
        runner.respond("peer chaincode query", ExecOutput::ok("3131\n"));
        let client = PeerCliClient::new(runner.clone(), connection());
        let out = client
            .evaluate("get", &["74".to_string(), "41".to_string()])
            .unwrap();
        assert_eq!(out, "3131");

        let cmd = runner.find("query").unwrap();
        assert!(cmd.contains("CORE_PEER_ADDRESS='localhost:7051'"));
        assert!(cmd.contains("-C 'ch' -n 'ch'"));
        assert!(cmd.ends_with("-c '{\"function\":\"get\",\"Args\":[\"74\",\"41\"]}'"));
    }

    #[test]
    fn test_invoke_failure_carries_stderr() {
        let runner = Arc::new(ScriptedRunner::strict());
        runner.respond(
            "peer chaincode invoke",
            ExecOutput::failed("Error: endorsement failure: Key not found"),
        );
        let client = PeerCliClient::new(runner.clone(), connection());
        match client.submit("delete", &["74".to_string(), "[]".to_string()]) {
            Err(ChainError::CommandFailed(msg)) => assert!(msg.contains("Key not found")),
            other => panic!("unexpected {:?}", other),
        }
        let cmd = runner.find("invoke").unwrap();
        assert!(cmd.contains("tlsca.example.com-cert.pem"));
        assert!(cmd.contains("--waitForEvent"));
    }

    #[test]
    fn test_invoke_retries_until_success() {
        let runner = Arc::new(ScriptedRunner::strict());
        runner.respond_seq(
            "peer chaincode invoke",
            vec![ExecOutput::failed("unavailable"), ExecOutput::ok("")],
        );
        let client = PeerCliClient::new(runner.clone(), connection())
            .with_invoke_timeout(Duration::from_secs(5));
        client.submit("put", &["74".to_string(), "{}".to_string()]).unwrap();
        assert_eq!(runner.count_matching("invoke"), 2);
    }
}
