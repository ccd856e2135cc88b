use std::fs;
use std::path::{Path, PathBuf};

use common::prelude::*;

pub const BLOCK_FILE: &str = "blocknumber.txt";

/// Simulated chain height of a stub network.
///
/// The transaction count is kept in `blocknumber.txt` in the network's data
/// directory; the block number is `transaction_count / blocksize`.
#[derive(Debug, Clone)]
pub struct BlockNumber {
    path: PathBuf,
    blocksize: u64,
}

impl BlockNumber {
    pub fn new<P: AsRef<Path>>(data_path: P, blocksize: u64) -> Result<Self, ChainError> {
        if blocksize == 0 {
            return Err(ChainError::ConfigError("blocksize must be positive".to_string()));
        }
        Ok(BlockNumber {
            path: data_path.as_ref().join(BLOCK_FILE),
            blocksize,
        })
    }

    /// Starts the count at 1 unless another adapter already did.
    pub fn init(&self) -> Result<(), ChainError> {
        if !self.path.exists() {
            self.write(1)?;
        }
        Ok(())
    }

    pub fn transaction_count(&self) -> Result<u64, ChainError> {
        let contents = fs::read_to_string(&self.path)?;
        contents.trim().parse::<u64>().map_err(|_| {
            ChainError::DecodeError(format!(
                "bad transaction count '{}' in {}",
                contents.trim(),
                self.path.display()
            ))
        })
    }

    pub fn increment_transaction_count(&self) -> Result<(), ChainError> {
        let count = self.transaction_count()? + 1;
        self.write(count)?;
        trace!("BlockNumber: transaction count is now {}", count);
        Ok(())
    }

    pub fn get(&self) -> Result<u64, ChainError> {
        Ok(self.transaction_count()? / self.blocksize)
    }

    /// True when `block_timeout` lies beyond the current block. Signed
    /// requests carrying such a timeout are refused.
    pub fn has_lock_timed_out(&self, block_timeout: u64) -> Result<bool, ChainError> {
        Ok(block_timeout > self.get()?)
    }

    fn write(&self, count: u64) -> Result<(), ChainError> {
        fs::write(&self.path, format!("{}\n", count))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_block_number_advances_every_blocksize_transactions() {
        let dir = tempdir().unwrap();
        let blocks = BlockNumber::new(dir.path(), 3).unwrap();
        blocks.init().unwrap();
        assert_eq!(blocks.transaction_count().unwrap(), 1);
        assert_eq!(blocks.get().unwrap(), 0);

        let before = blocks.get().unwrap();
        for _ in 0..3 {
            blocks.increment_transaction_count().unwrap();
        }
        assert_eq!(blocks.get().unwrap(), before + 1);
        assert_eq!(blocks.transaction_count().unwrap(), 4);
    }

    #[test]
    fn test_init_keeps_existing_count() {
        let dir = tempdir().unwrap();
        let blocks = BlockNumber::new(dir.path(), 1).unwrap();
        blocks.init().unwrap();
        blocks.increment_transaction_count().unwrap();
        BlockNumber::new(dir.path(), 1).unwrap().init().unwrap();
        assert_eq!(blocks.transaction_count().unwrap(), 2);
    }

    #[test]
    fn test_lock_timeout() {
        let dir = tempdir().unwrap();
        let blocks = BlockNumber::new(dir.path(), 1).unwrap();
        blocks.init().unwrap();
        assert!(!blocks.has_lock_timed_out(0).unwrap());
        assert!(!blocks.has_lock_timed_out(1).unwrap());
        assert!(blocks.has_lock_timed_out(2).unwrap());
    }

    #[test]
    fn test_bad_inputs() {
        let dir = tempdir().unwrap();
        assert!(BlockNumber::new(dir.path(), 0).is_err());
        let blocks = BlockNumber::new(dir.path(), 2).unwrap();
        assert!(matches!(blocks.get(), Err(ChainError::IOError(_))));
        fs::write(dir.path().join(BLOCK_FILE), "twelve").unwrap();
        assert!(matches!(blocks.get(), Err(ChainError::DecodeError(_))));
    }
}
