use std::error::Error;
use std::fmt;
use std::io;

pub fn c_err(s: &str) -> ChainError {
    ChainError::ChainError(s.to_string())
}

/// Error type shared by the managers and adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainError {
    /// IO Errors.
    IOError(String),
    /// Serialization errors.
    SerializationError(String),
    /// Custom errors.
    ChainError(String),
    /// Config file unreadable or a required key is missing.
    ConfigError(String),
    /// Network, table or container already exists.
    AlreadyExists(String),
    /// Network, table, key or container does not exist.
    NotFound(String),
    /// An external command returned a failure status.
    CommandFailed(String),
    /// An external command did not succeed before its deadline.
    Timeout(String),
    /// A cross-process lock could not be acquired.
    LockContention(String),
    /// Malformed hex or wire data.
    DecodeError(String),
    /// No free port left above the configured base.
    ResourceExhausted(String),
    /// Operation not valid in the current state (e.g. no table loaded).
    InvalidOperation(String),
}

impl ChainError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ChainError::NotFound(_))
    }
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ChainError::IOError(s) => s.to_string(),
                ChainError::SerializationError(s) => s.to_string(),
                ChainError::ChainError(s) => format!("Chain Error: {}", s),
                ChainError::ConfigError(s) => format!("Config Error: {}", s),
                ChainError::AlreadyExists(s) => format!("Already Exists: {}", s),
                ChainError::NotFound(s) => format!("Not Found: {}", s),
                ChainError::CommandFailed(s) => format!("Command Failed: {}", s),
                ChainError::Timeout(s) => format!("Timed Out: {}", s),
                ChainError::LockContention(s) => format!("Lock Not Acquired: {}", s),
                ChainError::DecodeError(s) => format!("Decode Error: {}", s),
                ChainError::ResourceExhausted(s) => format!("Resource Exhausted: {}", s),
                ChainError::InvalidOperation(s) => format!("Invalid Operation: {}", s),
            }
        )
    }
}

// Implement std::convert::From for ChainError; from io::Error
impl From<io::Error> for ChainError {
    fn from(error: io::Error) -> Self {
        ChainError::IOError(error.to_string())
    }
}

impl From<serde_json::Error> for ChainError {
    fn from(error: serde_json::Error) -> Self {
        ChainError::SerializationError(error.to_string())
    }
}

impl From<hex::FromHexError> for ChainError {
    fn from(error: hex::FromHexError) -> Self {
        ChainError::DecodeError(error.to_string())
    }
}

// Implement std::convert::From for std::sync::PoisonError
impl<T> From<std::sync::PoisonError<T>> for ChainError {
    fn from(error: std::sync::PoisonError<T>) -> Self {
        ChainError::ChainError(error.to_string())
    }
}

impl Error for ChainError {}
