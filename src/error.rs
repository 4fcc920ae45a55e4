use std::io;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RbtError {
    #[error("{0}")]
    Message(String),
    #[error("{0}")]
    Config(ConfigError),
    #[error("{0}")]
    Io(#[from] io::Error),
    #[error("lock {}: {source}", path.display())]
    LockFile { path: PathBuf, source: io::Error },
    #[error("timeout after {}s waiting for lock {}; another run appears to be active", timeout.as_secs(), path.display())]
    LockTimeout { path: PathBuf, timeout: Duration },
    #[error("{program} {status}")]
    Transfer { program: String, status: String },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config not found: {0}")]
    NotFound(String),
    #[error("parse config: {0}")]
    Parse(String),
    #[error("{0}")]
    Invalid(String),
}

pub type Result<T> = std::result::Result<T, RbtError>;

impl RbtError {
    pub fn message(msg: impl Into<String>) -> Self {
        RbtError::Message(msg.into())
    }

    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, RbtError::LockTimeout { .. })
    }
}

impl From<ConfigError> for RbtError {
    fn from(err: ConfigError) -> Self {
        RbtError::Config(err)
    }
}
