use std::fmt;
use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info};

use crate::backup::gate::{is_run_due, next_run_at};
use crate::backup::lock::{run_exclusive, DEFAULT_LOCK_TIMEOUT};
use crate::backup::rotation::{ensure_directories, list_generations};
use crate::backup::rsync::Transfer;
use crate::config::load::load_config;
use crate::config::locate::resolve_config;
use crate::config::model::Job;
use crate::error::{RbtError, Result};
use crate::types::{RunMode, Stage};

pub mod completion;
pub mod gate;
pub mod lock;
pub mod rotation;
pub mod rsync;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The cool-down since the last completion has not passed.
    Skipped { next_run: Option<DateTime<Utc>> },
    Completed { duration: Duration },
    DryRun,
}

#[derive(Debug)]
pub struct JobFailure {
    pub job: String,
    pub stage: Stage,
    pub error: RbtError,
}

impl JobFailure {
    pub fn new(job: &str, stage: Stage, error: RbtError) -> Self {
        Self {
            job: job.to_string(),
            stage,
            error,
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}: {}", self.stage, self.job, self.error)
    }
}

impl std::error::Error for JobFailure {}

pub type JobResult = std::result::Result<JobOutcome, JobFailure>;

pub struct BackupRunner {
    pub transfer: Transfer,
    pub lock_timeout: Duration,
    pub run_mode: RunMode,
}

impl Default for BackupRunner {
    fn default() -> Self {
        Self {
            transfer: Transfer::default(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            run_mode: RunMode::default(),
        }
    }
}

impl BackupRunner {
    pub fn run_config(&self, path: &Path) -> JobResult {
        let job = load_config(path)
            .map_err(|e| JobFailure::new(&path.display().to_string(), Stage::Load, e))?;
        self.run_job(&job)
    }

    /// Init, gate check, then transfer and rotation under the job lock.
    pub fn run_job(&self, job: &Job) -> JobResult {
        let fail = |stage: Stage| move |e: RbtError| JobFailure::new(&job.name, stage, e);

        if self.run_mode.dry_run {
            debug!("{}: dry-run, skipping directory setup", job.name);
        } else {
            ensure_directories(job).map_err(fail(Stage::Init))?;
        }

        if !is_run_due(job).map_err(fail(Stage::Gate))? {
            return self.skipped(job).map_err(fail(Stage::Gate));
        }
        if self.run_mode.dry_run {
            self.transfer
                .run(job, self.run_mode)
                .map_err(fail(Stage::Run))?;
            return Ok(JobOutcome::DryRun);
        }

        debug!("{}: using lock file {}", job.name, job.lock_path().display());
        run_exclusive(&job.lock_path(), self.lock_timeout, || Ok(self.run_locked(job)))
            .unwrap_or_else(|e| Err(JobFailure::new(&job.name, Stage::Lock, e)))
    }

    /// The part of a run that happens while the job lock is held.
    fn run_locked(&self, job: &Job) -> JobResult {
        let fail = |stage: Stage| move |e: RbtError| JobFailure::new(&job.name, stage, e);

        // another invocation may have finished while we waited for the lock
        if !is_run_due(job).map_err(fail(Stage::Gate))? {
            return self.skipped(job).map_err(fail(Stage::Gate));
        }
        let duration = self
            .transfer
            .run(job, self.run_mode)
            .map_err(fail(Stage::Run))?;
        Ok(JobOutcome::Completed { duration })
    }

    fn skipped(&self, job: &Job) -> Result<JobOutcome> {
        let next_run = next_run_at(job)?;
        if let Some(next) = next_run {
            info!("{}: not due until {}", job.name, next.to_rfc3339());
        }
        Ok(JobOutcome::Skipped { next_run })
    }

    /// Resolves and runs every job in the order given. A failing job never
    /// stops the batch.
    pub fn run_jobs<S: AsRef<str>>(&self, identifiers: &[S], search_dir: &Path) -> Vec<JobResult> {
        identifiers
            .iter()
            .map(|identifier| {
                let identifier = identifier.as_ref();
                let result = resolve_config(identifier, search_dir)
                    .map_err(|e| JobFailure::new(identifier, Stage::Load, e))
                    .and_then(|path| self.run_config(&path));
                if let Err(failure) = &result {
                    error!("{}", failure);
                }
                result
            })
            .collect()
    }
}

pub fn print_job_status(job: &Job) -> Result<()> {
    println!("job: {}", job.name);
    println!("  target: {}", job.target().display());
    println!("  retention: {}", job.retention);
    println!("  sources: {}", job.sources.join(", "));
    let excludes = if job.excludes.is_empty() {
        "<none>".to_string()
    } else {
        job.excludes.join(", ")
    };
    println!("  excludes: {}", excludes);
    for generation in list_generations(job)? {
        let state = match (&generation.completion, generation.exists) {
            (Some(record), _) => format!(
                "completed {} in {}s",
                record.timestamp.to_rfc3339(),
                record.duration
            ),
            (None, true) => "incomplete".to_string(),
            (None, false) => "missing".to_string(),
        };
        println!("  backup.{}: {}", generation.index, state);
    }
    match next_run_at(job)? {
        Some(next) => println!("  next run: {}", next.to_rfc3339()),
        None => println!("  next run: now"),
    }
    Ok(())
}
