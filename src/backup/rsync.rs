use std::path::PathBuf;
use std::process::Command;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, warn};

use crate::backup::completion::{write_completion, CompletionRecord};
use crate::backup::rotation::rotate;
use crate::config::model::Job;
use crate::error::{RbtError, Result};
use crate::types::RunMode;
use crate::util::command::{maybe_print_command, run_command};

pub const DEFAULT_RSYNC: &str = "/usr/bin/rsync";

/// rsync exit status for "some source files vanished before they could be
/// transferred". The snapshot is still usable.
pub const RSYNC_EXIT_VANISHED: i32 = 24;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Complete,
    Partial,
}

/// How the transfer tool is launched: optional wrapper words, then the program.
#[derive(Debug, Clone)]
pub struct Transfer {
    pub wrapper: Vec<String>,
    pub program: PathBuf,
}

impl Default for Transfer {
    fn default() -> Self {
        Self::new(PathBuf::from(DEFAULT_RSYNC))
    }
}

impl Transfer {
    pub fn new(program: PathBuf) -> Self {
        Self {
            wrapper: Vec::new(),
            program,
        }
    }

    /// Runs the program at the lowest CPU and idle I/O priority.
    pub fn niced(mut self) -> Self {
        self.wrapper = ["nice", "-n", "19", "ionice", "-c", "3", "-n7"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        self
    }

    pub fn command(&self, job: &Job) -> Command {
        let mut cmd = match self.wrapper.split_first() {
            Some((first, rest)) => {
                let mut cmd = Command::new(first);
                cmd.args(rest).arg(&self.program);
                cmd
            }
            None => Command::new(&self.program),
        };
        cmd.args(rsync_args(job));
        cmd
    }

    /// Transfers into the write slot, then records completion and rotates.
    /// Returns the transfer duration.
    pub fn run(&self, job: &Job, run_mode: RunMode) -> Result<Duration> {
        let mut cmd = self.command(job);
        if run_mode.dry_run {
            maybe_print_command(&cmd, run_mode);
            return Ok(Duration::ZERO);
        }

        info!("{}: transferring into {}", job.name, job.write_slot().display());
        let started = Instant::now();
        let code = run_command(&mut cmd, run_mode)?;
        let elapsed = started.elapsed();
        if classify_exit(&self.program.to_string_lossy(), code)? == TransferStatus::Partial {
            warn!("{}: some source files vanished during transfer", job.name);
        }

        let record = CompletionRecord::new(&job.name, Utc::now(), elapsed.as_secs());
        write_completion(job, &record)?;
        rotate(job)?;
        info!("{}: completed in {}s", job.name, elapsed.as_secs());
        Ok(elapsed)
    }
}

pub fn rsync_args(job: &Job) -> Vec<String> {
    let mut args = vec![
        "-aR".to_string(),
        "--delete".to_string(),
        "--stats".to_string(),
        format!("--link-dest={}", job.latest_dir().display()),
    ];
    for source in &job.sources {
        args.push(format!("{}:{}", job.name, source));
    }
    for pattern in &job.excludes {
        args.push("--exclude".to_string());
        args.push(pattern.clone());
    }
    args.push(job.write_slot().to_string_lossy().to_string());
    args
}

/// Maps the tool's exit code (`None` when killed by a signal) to an outcome.
pub fn classify_exit(program: &str, code: Option<i32>) -> Result<TransferStatus> {
    match code {
        Some(0) => Ok(TransferStatus::Complete),
        Some(RSYNC_EXIT_VANISHED) => Ok(TransferStatus::Partial),
        Some(code) => Err(RbtError::Transfer {
            program: program.to_string(),
            status: format!("exited with status {}", code),
        }),
        None => Err(RbtError::Transfer {
            program: program.to_string(),
            status: "was killed by a signal".to_string(),
        }),
    }
}
