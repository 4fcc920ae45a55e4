pub mod backup;
pub mod cli;
pub mod config;
pub mod error;
pub mod types;
pub mod util;

pub use backup::{BackupRunner, JobFailure, JobOutcome};
pub use config::model::Job;
pub use error::{ConfigError, RbtError, Result};
