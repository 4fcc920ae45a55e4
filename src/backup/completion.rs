use std::fs::{self, File};
use std::io::{self, BufReader, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::model::Job;
use crate::error::{RbtError, Result};

/// Marker written into a generation once its transfer finished.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CompletionRecord {
    #[serde(default)]
    pub name: String,
    pub timestamp: DateTime<Utc>,
    /// Transfer wall-clock time in seconds.
    pub duration: u64,
}

impl CompletionRecord {
    pub fn new(name: &str, timestamp: DateTime<Utc>, duration: u64) -> Self {
        Self {
            name: name.to_string(),
            timestamp,
            duration,
        }
    }
}

/// Writes `record` into the job's write slot, ahead of rotation.
pub fn write_completion(job: &Job, record: &CompletionRecord) -> Result<()> {
    let path = job.completion_path(job.retention);
    write_record(&path, record)?;
    debug!("wrote completion record {}", path.display());
    Ok(())
}

/// Reads the record of the newest generation, `None` if it has never completed.
pub fn read_latest_completion(job: &Job) -> Result<Option<CompletionRecord>> {
    read_record(&job.completion_path(0))
}

pub fn read_record(path: &Path) -> Result<Option<CompletionRecord>> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(RbtError::message(format!("open {}: {}", path.display(), err)));
        }
    };
    let record = serde_json::from_reader(BufReader::new(file))
        .map_err(|e| RbtError::message(format!("parse {}: {}", path.display(), e)))?;
    Ok(Some(record))
}

fn write_record(path: &Path, record: &CompletionRecord) -> Result<()> {
    let data = serde_json::to_string(record)
        .map_err(|e| RbtError::message(format!("encode completion record: {}", e)))?;
    let mut file = File::create(path)
        .map_err(|e| RbtError::message(format!("create {}: {}", path.display(), e)))?;
    writeln!(file, "{}", data)
        .and_then(|()| file.sync_all())
        .map_err(|e| RbtError::message(format!("write {}: {}", path.display(), e)))?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o644))
        .map_err(|e| RbtError::message(format!("chmod {}: {}", path.display(), e)))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn job_in(dir: &TempDir) -> Job {
        Job {
            name: "home".to_string(),
            retention: 2,
            target_template: dir.path().join("$name").to_string_lossy().to_string(),
            sources: vec!["/home".to_string()],
            excludes: Vec::new(),
        }
    }

    #[test]
    fn record_roundtrip() {
        let dir = TempDir::new().expect("tempdir");
        let job = job_in(&dir);
        fs::create_dir_all(job.write_slot()).expect("mkdir");
        let record = CompletionRecord::new(
            "home",
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 15).unwrap(),
            381,
        );
        write_completion(&job, &record).expect("write");

        let loaded = read_record(&job.completion_path(2)).expect("read").expect("present");
        assert_eq!(loaded, record);
        let meta = fs::metadata(job.completion_path(2)).expect("stat");
        assert_eq!(meta.permissions().mode() & 0o777, 0o644);
    }

    #[test]
    fn missing_record_is_none() {
        let dir = TempDir::new().expect("tempdir");
        let job = job_in(&dir);
        assert!(read_latest_completion(&job).expect("read").is_none());
    }

    #[test]
    fn reads_records_with_offsets_and_no_name() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("completed");
        fs::write(
            &path,
            "{\"timestamp\":\"2024-05-01T14:30:15.123456789+02:00\",\"duration\":12}\n",
        )
        .expect("write");
        let record = read_record(&path).expect("read").expect("present");
        assert_eq!(record.name, "");
        assert_eq!(record.duration, 12);
        assert_eq!(
            record.timestamp.timestamp(),
            Utc.with_ymd_and_hms(2024, 5, 1, 12, 30, 15).unwrap().timestamp()
        );
    }

    #[test]
    fn corrupt_record_is_an_error() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("completed");
        fs::write(&path, "not json").expect("write");
        assert!(read_record(&path).is_err());
    }
}
