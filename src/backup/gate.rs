use chrono::{DateTime, Duration, Utc};

use crate::backup::completion::read_latest_completion;
use crate::config::model::Job;
use crate::error::Result;

/// Minimum time between the end of one run and the start of the next.
pub const COOL_DOWN: Duration = Duration::hours(1);

pub fn is_run_due(job: &Job) -> Result<bool> {
    is_run_due_at(job, Utc::now())
}

pub fn is_run_due_at(job: &Job, now: DateTime<Utc>) -> Result<bool> {
    Ok(match next_run_at(job)? {
        Some(next) => next <= now,
        None => true,
    })
}

/// Earliest time the next run may start; `None` when the job has never completed.
pub fn next_run_at(job: &Job) -> Result<Option<DateTime<Utc>>> {
    Ok(read_latest_completion(job)?.map(|record| record.timestamp + COOL_DOWN))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backup::completion::{write_completion, CompletionRecord};
    use std::fs;
    use tempfile::TempDir;

    fn job_in(dir: &TempDir) -> Job {
        Job {
            name: "home".to_string(),
            retention: 1,
            target_template: dir.path().join("$name").to_string_lossy().to_string(),
            sources: vec!["/home".to_string()],
            excludes: Vec::new(),
        }
    }

    fn completed_at(job: &Job, at: DateTime<Utc>) {
        fs::create_dir_all(job.write_slot()).expect("mkdir");
        fs::create_dir_all(job.latest_dir()).expect("mkdir");
        write_completion(job, &CompletionRecord::new(&job.name, at, 5)).expect("write");
        fs::rename(job.completion_path(job.retention), job.completion_path(0)).expect("move");
    }

    #[test]
    fn due_without_record() {
        let dir = TempDir::new().expect("tempdir");
        assert!(is_run_due(&job_in(&dir)).expect("gate"));
    }

    #[test]
    fn closed_half_an_hour_after_completion() {
        let dir = TempDir::new().expect("tempdir");
        let job = job_in(&dir);
        let now = Utc::now();
        completed_at(&job, now - Duration::minutes(30));
        assert!(!is_run_due_at(&job, now).expect("gate"));
    }

    #[test]
    fn open_ninety_minutes_after_completion() {
        let dir = TempDir::new().expect("tempdir");
        let job = job_in(&dir);
        let now = Utc::now();
        completed_at(&job, now - Duration::minutes(90));
        assert!(is_run_due_at(&job, now).expect("gate"));
    }

    #[test]
    fn opens_exactly_at_cool_down() {
        let dir = TempDir::new().expect("tempdir");
        let job = job_in(&dir);
        let last = Utc::now() - Duration::hours(2);
        completed_at(&job, last);
        assert!(is_run_due_at(&job, last + COOL_DOWN).expect("gate"));
        assert!(!is_run_due_at(&job, last + COOL_DOWN - Duration::seconds(1)).expect("gate"));
    }

    #[test]
    fn unreadable_record_is_an_error() {
        let dir = TempDir::new().expect("tempdir");
        let job = job_in(&dir);
        fs::create_dir_all(job.latest_dir()).expect("mkdir");
        fs::write(job.completion_path(0), "{").expect("write");
        assert!(is_run_due(&job).is_err());
    }
}
