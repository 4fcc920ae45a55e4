use std::env;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::backup::rsync::Transfer;
use crate::backup::{print_job_status, BackupRunner, JobFailure, JobOutcome, JobResult};
use crate::cli::args::Cli;
use crate::config::load::load_config;
use crate::config::locate::{identifier_from_program, resolve_config};
use crate::types::{RunMode, Stage};

pub mod args;

pub const EXIT_OK: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_LOCK_TIMEOUT: i32 = 3;

/// Parses the command line and runs every requested job. Returns the exit code.
pub fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut identifiers = cli.identifiers();
    if identifiers.is_empty() {
        let argv0 = env::args().next().unwrap_or_default();
        match identifier_from_program(&argv0) {
            Some(identifier) => identifiers.push(identifier),
            None => {
                println!("For usage use -h");
                return Ok(EXIT_OK);
            }
        }
    }

    if cli.status {
        return Ok(show_status(&identifiers, &cli.config_dir));
    }

    let mut transfer = Transfer::new(cli.rsync.clone());
    if cli.nice {
        transfer = transfer.niced();
    }
    let runner = BackupRunner {
        transfer,
        lock_timeout: Duration::from_secs(cli.lock_timeout),
        run_mode: RunMode {
            dry_run: cli.dry_run,
            verbose: cli.verbose,
        },
    };
    let results = runner.run_jobs(&identifiers, &cli.config_dir);
    Ok(report(&results))
}

fn show_status(identifiers: &[String], search_dir: &Path) -> i32 {
    let mut results: Vec<JobResult> = Vec::new();
    for identifier in identifiers {
        let status = resolve_config(identifier, search_dir)
            .and_then(|path| load_config(&path))
            .map_err(|error| JobFailure::new(identifier, Stage::Load, error))
            .and_then(|job| {
                print_job_status(&job)
                    .map_err(|error| JobFailure::new(&job.name, Stage::Gate, error))
            });
        if let Err(failure) = status {
            results.push(Err(failure));
        }
    }
    report(&results)
}

/// Prints one line per failed job and picks the exit code.
fn report(results: &[JobResult]) -> i32 {
    let mut code = EXIT_OK;
    for result in results {
        match result {
            Ok(JobOutcome::Completed { duration }) => {
                debug!("job finished in {}s", duration.as_secs());
            }
            Ok(_) => {}
            Err(failure) => {
                println!("{}", failure);
                if failure.error.is_lock_timeout() {
                    if code == EXIT_OK {
                        code = EXIT_LOCK_TIMEOUT;
                    }
                } else {
                    code = EXIT_FAILED;
                }
            }
        }
    }
    code
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RbtError;
    use std::path::PathBuf;

    fn failure(error: RbtError) -> JobResult {
        Err(JobFailure {
            job: "home".to_string(),
            stage: Stage::Lock,
            error,
        })
    }

    fn timeout() -> RbtError {
        RbtError::LockTimeout {
            path: PathBuf::from("/srv/home/backup.lock"),
            timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn exit_code_reflects_worst_failure() {
        assert_eq!(report(&[Ok(JobOutcome::DryRun)]), EXIT_OK);
        assert_eq!(report(&[failure(timeout())]), EXIT_LOCK_TIMEOUT);
        assert_eq!(
            report(&[failure(RbtError::message("boom")), failure(timeout())]),
            EXIT_FAILED
        );
        assert_eq!(
            report(&[failure(timeout()), failure(RbtError::message("boom"))]),
            EXIT_FAILED
        );
    }
}
