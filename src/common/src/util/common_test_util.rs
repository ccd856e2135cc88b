use std::collections::VecDeque;
use std::env;
use std::sync::Mutex;
use std::time::Duration;

use rand::rngs::SmallRng;
use rand::{rng, Rng, SeedableRng};

use crate::bytes::{Batch, Bytes};
use crate::shell::{CommandRunner, ExecOutput};

pub fn get_rng() -> SmallRng {
    match env::var("CHAIN_SEED") {
        Ok(seed_str) => match seed_str.parse::<u64>() {
            Ok(seed) => {
                log::debug!("Using seed from CHAIN_SEED: {}", seed);
                SmallRng::seed_from_u64(seed)
            }
            Err(_) => {
                let seed = rng().random::<u64>();
                log::debug!("Failed to parse CHAIN_SEED, using random seed: {}", seed);
                SmallRng::seed_from_u64(seed)
            }
        },
        Err(_) => {
            let seed = rng().random::<u64>();
            log::debug!("No CHAIN_SEED provided, using random seed: {}", seed);
            SmallRng::seed_from_u64(seed)
        }
    }
}

pub fn init() {
    // To change the log level for tests change the filter_level
    let _ = env_logger::builder()
        .is_test(true)
        .filter_level(log::LevelFilter::Trace)
        .try_init();
}

pub fn get_random_byte_vec(rng: &mut SmallRng, n: usize) -> Vec<u8> {
    (0..n).map(|_| rng.random::<u8>()).collect()
}

/// Batch of `n` distinct random keys (1..=max_key_len bytes) with values of
/// up to `max_val_len` bytes.
pub fn gen_random_batch(
    rng: &mut SmallRng,
    n: usize,
    max_key_len: usize,
    max_val_len: usize,
) -> Batch {
    let mut batch = Batch::new();
    while batch.len() < n {
        let key_len = rng.random_range(1..=max_key_len);
        let val_len = rng.random_range(0..=max_val_len);
        batch.insert(
            Bytes::from(get_random_byte_vec(rng, key_len)),
            Bytes::from(get_random_byte_vec(rng, val_len)),
        );
    }
    batch
}

struct Rule {
    pattern: String,
    responses: VecDeque<ExecOutput>,
}

/// Fake [`CommandRunner`] that records every command and answers from a
/// list of substring rules. The first matching rule wins; a rule with several
/// responses hands them out in order and then keeps repeating the last one.
/// Unmatched commands succeed with empty output.
pub struct ScriptedRunner {
    rules: Mutex<Vec<Rule>>,
    executed: Mutex<Vec<String>>,
    fallback: ExecOutput,
}

impl Default for ScriptedRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedRunner {
    pub fn new() -> Self {
        ScriptedRunner {
            rules: Mutex::new(Vec::new()),
            executed: Mutex::new(Vec::new()),
            fallback: ExecOutput::ok(""),
        }
    }

    /// Unmatched commands fail instead of succeeding.
    pub fn strict() -> Self {
        ScriptedRunner {
            fallback: ExecOutput::failed("unexpected command"),
            ..Self::new()
        }
    }

    pub fn respond(&self, pattern: &str, output: ExecOutput) {
        self.respond_seq(pattern, vec![output]);
    }

    pub fn respond_seq(&self, pattern: &str, outputs: Vec<ExecOutput>) {
        self.rules.lock().unwrap().push(Rule {
            pattern: pattern.to_string(),
            responses: outputs.into(),
        });
    }

    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub fn count_matching(&self, pattern: &str) -> usize {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.contains(pattern))
            .count()
    }

    /// First executed command containing `pattern`.
    pub fn find(&self, pattern: &str) -> Option<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .find(|c| c.contains(pattern))
            .cloned()
    }
}

impl CommandRunner for ScriptedRunner {
    fn exec(&self, cmd: &str) -> ExecOutput {
        self.executed.lock().unwrap().push(cmd.to_string());
        let mut rules = self.rules.lock().unwrap();
        for rule in rules.iter_mut() {
            if cmd.contains(&rule.pattern) {
                if rule.responses.len() > 1 {
                    if let Some(out) = rule.responses.pop_front() {
                        return out;
                    }
                }
                if let Some(out) = rule.responses.front() {
                    return out.clone();
                }
            }
        }
        self.fallback.clone()
    }

    fn retry_backoff(&self) -> Duration {
        Duration::ZERO
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scripted_runner_rules() {
        let runner = ScriptedRunner::new();
        runner.respond("docker ps", ExecOutput::ok("abc\n"));
        assert_eq!(runner.exec("docker ps -q").stdout, "abc\n");
        assert!(runner.exec("anything else").success);
        assert_eq!(runner.count_matching("docker"), 1);
        assert_eq!(runner.executed().len(), 2);

        let strict = ScriptedRunner::strict();
        assert!(!strict.exec("rm -rf /").success);
    }

    #[test]
    fn test_gen_random_batch() {
        let mut rng = get_rng();
        let batch = gen_random_batch(&mut rng, 20, 8, 16);
        assert_eq!(batch.len(), 20);
        assert!(batch.keys().all(|k| !k.is_empty() && k.len() <= 8));
    }
}
