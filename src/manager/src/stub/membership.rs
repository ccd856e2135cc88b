//! Member bookkeeping for stub networks: a counter file guarded by a
//! cross-process lock.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use common::prelude::*;

pub const MEMBERS_FILE: &str = "config.ini";
pub const LOCK_DIR: &str = "directory_mutex";
const MEMBERS_KEY: &str = "members";

/// Mutual exclusion between processes sharing a filesystem.
pub trait AdvisoryLock {
    /// One attempt. `Ok(false)` means somebody else holds the lock.
    fn try_acquire(&self) -> Result<bool, ChainError>;

    fn release(&self) -> Result<(), ChainError>;
}

/// Lock held while a directory exists; `mkdir` is atomic.
pub struct DirLock {
    path: PathBuf,
}

impl DirLock {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        DirLock {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl AdvisoryLock for DirLock {
    fn try_acquire(&self) -> Result<bool, ChainError> {
        match fs::create_dir(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    fn release(&self) -> Result<(), ChainError> {
        match fs::remove_dir(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Holds an [`AdvisoryLock`] until dropped.
pub struct LockGuard<'a> {
    lock: &'a dyn AdvisoryLock,
    armed: bool,
}

impl<'a> LockGuard<'a> {
    /// Tries `retries` times, sleeping `backoff` between attempts.
    pub fn acquire(
        lock: &'a dyn AdvisoryLock,
        retries: u32,
        backoff: Duration,
    ) -> Result<Self, ChainError> {
        for attempt in 0..retries.max(1) {
            if lock.try_acquire()? {
                return Ok(LockGuard { lock, armed: true });
            }
            trace!("LockGuard: attempt {} found the lock held", attempt + 1);
            thread::sleep(backoff);
        }
        Err(ChainError::LockContention(format!(
            "lock still held after {} attempts",
            retries.max(1)
        )))
    }

    /// Forgets the lock without releasing it, e.g. after its directory has
    /// been removed together with the network.
    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            if let Err(e) = self.lock.release() {
                warn!("LockGuard: failed to release lock: {}", e);
            }
        }
    }
}

/// Durable member counter of one network.
pub trait MemberStore {
    fn exists(&self) -> bool;

    fn read(&self) -> Result<i64, ChainError>;

    fn write(&self, count: i64) -> Result<(), ChainError>;
}

/// Counter stored as a single `members= N` line.
pub struct MembersFile {
    path: PathBuf,
}

impl MembersFile {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        MembersFile {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl MemberStore for MembersFile {
    fn exists(&self) -> bool {
        self.path.is_file()
    }

    fn read(&self) -> Result<i64, ChainError> {
        let contents = fs::read_to_string(&self.path)?;
        for line in contents.lines() {
            if let Some((key, value)) = line.split_once('=') {
                if key.trim() == MEMBERS_KEY {
                    return value.trim().parse::<i64>().map_err(|_| {
                        ChainError::DecodeError(format!(
                            "bad member count '{}' in {}",
                            value.trim(),
                            self.path.display()
                        ))
                    });
                }
            }
        }
        Err(ChainError::DecodeError(format!(
            "no member count in {}",
            self.path.display()
        )))
    }

    fn write(&self, count: i64) -> Result<(), ChainError> {
        fs::write(&self.path, format!("{}= {}\n", MEMBERS_KEY, count))?;
        Ok(())
    }
}
