use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::util::paths::{
    generation_dir, COMPLETION_FILE_NAME, LOCK_FILE_NAME, NAME_PLACEHOLDER, STAGING_DIR_NAME,
};

/// On-disk job description.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct JobConfig {
    pub name: String,
    pub backups: usize,
    pub target: String,
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// A validated backup job. Every path used by a run is derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub name: String,
    pub retention: usize,
    pub target_template: String,
    pub sources: Vec<String>,
    pub excludes: Vec<String>,
}

impl Job {
    pub fn target(&self) -> PathBuf {
        PathBuf::from(self.target_template.replace(NAME_PLACEHOLDER, &self.name))
    }

    pub fn generation_dir(&self, idx: usize) -> PathBuf {
        generation_dir(&self.target(), idx)
    }

    /// Most recent completed generation, the hard-link base for the next transfer.
    pub fn latest_dir(&self) -> PathBuf {
        self.generation_dir(0)
    }

    /// Slot the transfer writes into; it holds the oldest generation until then.
    pub fn write_slot(&self) -> PathBuf {
        self.generation_dir(self.retention)
    }

    pub fn staging_dir(&self) -> PathBuf {
        self.target().join(STAGING_DIR_NAME)
    }

    pub fn lock_path(&self) -> PathBuf {
        self.target().join(LOCK_FILE_NAME)
    }

    pub fn completion_path(&self, idx: usize) -> PathBuf {
        self.generation_dir(idx).join(COMPLETION_FILE_NAME)
    }
}
