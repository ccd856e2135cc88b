//! Running external commands (docker, node start scripts, ledger CLIs).
//!
//! Every interaction with the outside world goes through [`CommandRunner`],
//! so backends can be exercised against a scripted fake in tests.

use std::collections::BTreeSet;
use std::process::Command;
use std::thread;
use std::time::{Duration, Instant};

use crate::error::ChainError;

/// Backoff between attempts of [`CommandRunner::retry_exec`].
pub const RETRY_EXEC_BACKOFF: Duration = Duration::from_millis(100);

pub const TEN_SEC: Duration = Duration::from_secs(10);
pub const ONE_MIN: Duration = Duration::from_secs(60);
pub const THREE_MIN: Duration = Duration::from_secs(180);

/// Result of one command invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

impl ExecOutput {
    pub fn ok(stdout: &str) -> Self {
        ExecOutput {
            stdout: stdout.to_string(),
            stderr: String::new(),
            success: true,
        }
    }

    pub fn failed(stderr: &str) -> Self {
        ExecOutput {
            stdout: String::new(),
            stderr: stderr.to_string(),
            success: false,
        }
    }

    /// Non-empty trimmed stdout lines.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.stdout.lines().map(str::trim).filter(|l| !l.is_empty())
    }
}

pub trait CommandRunner: Send + Sync {
    /// Runs `cmd` through the shell. Failing to spawn counts as an
    /// unsuccessful run.
    fn exec(&self, cmd: &str) -> ExecOutput;

    fn retry_backoff(&self) -> Duration {
        RETRY_EXEC_BACKOFF
    }

    /// Repeats `cmd` until it succeeds or `timeout` has elapsed and returns
    /// the last attempt. Always runs at least once.
    fn retry_exec(&self, cmd: &str, timeout: Duration) -> ExecOutput {
        let start = Instant::now();
        let mut attempts = 0;
        loop {
            attempts += 1;
            let out = self.exec(cmd);
            if out.success || start.elapsed() >= timeout {
                trace!(
                    "retry_exec: '{}' finished after {} attempt(s), success={}",
                    cmd,
                    attempts,
                    out.success
                );
                return out;
            }
            thread::sleep(self.retry_backoff());
        }
    }

    /// [`CommandRunner::exec`] with failure turned into an error.
    fn exec_checked(&self, cmd: &str) -> Result<ExecOutput, ChainError> {
        let out = self.exec(cmd);
        if out.success {
            Ok(out)
        } else {
            Err(ChainError::CommandFailed(describe_failure(cmd, &out)))
        }
    }

    /// [`CommandRunner::retry_exec`] with a final failure turned into a
    /// timeout error.
    fn retry_checked(&self, cmd: &str, timeout: Duration) -> Result<ExecOutput, ChainError> {
        let out = self.retry_exec(cmd, timeout);
        if out.success {
            Ok(out)
        } else {
            Err(ChainError::Timeout(format!(
                "after {:?}: {}",
                timeout,
                describe_failure(cmd, &out)
            )))
        }
    }

    /// Host ports currently published by any container, running or not.
    fn docker_host_ports(&self) -> Result<BTreeSet<u16>, ChainError> {
        let out = self.exec_checked(DOCKER_PORTS_CMD)?;
        Ok(parse_docker_ports(&out.stdout))
    }
}

pub const DOCKER_PORTS_CMD: &str = "docker container ls --format \"table {{.Ports}}\" -a";

/// Runs commands with `sh -c`.
#[derive(Debug, Clone, Default)]
pub struct ShellRunner;

impl ShellRunner {
    pub fn new() -> Self {
        ShellRunner
    }
}

impl CommandRunner for ShellRunner {
    fn exec(&self, cmd: &str) -> ExecOutput {
        debug!("exec: {}", cmd);
        match Command::new("sh").arg("-c").arg(cmd).output() {
            Ok(output) => {
                let out = ExecOutput {
                    stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                    success: output.status.success(),
                };
                if !out.success {
                    debug!("exec: '{}' exited with {}", cmd, output.status);
                }
                out
            }
            Err(e) => {
                error!("exec: could not spawn '{}': {}", cmd, e);
                ExecOutput::failed(&e.to_string())
            }
        }
    }
}

fn describe_failure(cmd: &str, out: &ExecOutput) -> String {
    let detail = out.stderr.trim();
    if detail.is_empty() {
        format!("'{}'", cmd)
    } else {
        format!("'{}': {}", cmd, detail)
    }
}

/// Extracts published host ports from a `{{.Ports}}` listing.
///
/// Entries look like `0.0.0.0:8545->8545/tcp`, `:::30303->30303/udp` or
/// `0.0.0.0:7050-7051->7050-7051/tcp`; exposed-only entries such as
/// `8545/tcp` publish nothing on the host and are skipped.
pub fn parse_docker_ports(listing: &str) -> BTreeSet<u16> {
    let mut ports = BTreeSet::new();
    for mapping in listing.lines().flat_map(|l| l.split(',')) {
        let host = match mapping.trim().split_once("->") {
            Some((host, _)) => host,
            None => continue,
        };
        let host_ports = match host.rsplit_once(':') {
            Some((_, p)) => p,
            None => continue,
        };
        match host_ports.split_once('-') {
            Some((lo, hi)) => {
                if let (Ok(lo), Ok(hi)) = (lo.parse::<u16>(), hi.parse::<u16>()) {
                    ports.extend(lo..=hi);
                }
            }
            None => {
                if let Ok(p) = host_ports.parse::<u16>() {
                    ports.insert(p);
                }
            }
        }
    }
    ports
}

/// Wraps `arg` in single quotes for `sh`.
pub fn shell_quote(arg: &str) -> String {
    format!("'{}'", arg.replace('\'', "'\\''"))
}
