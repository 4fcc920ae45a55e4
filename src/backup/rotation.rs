use std::fs::{self, DirBuilder};
use std::io;
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::backup::completion::{read_record, CompletionRecord};
use crate::config::model::Job;
use crate::error::{RbtError, Result};

const DIR_MODE: u32 = 0o755;

/// One slot of the generation ring as found on disk.
#[derive(Debug, Clone)]
pub struct Generation {
    pub index: usize,
    pub path: PathBuf,
    pub exists: bool,
    pub completion: Option<CompletionRecord>,
}

/// Creates the target directory and `backup.0..=backup.<retention>`.
/// Returns how many directories were created.
pub fn ensure_directories(job: &Job) -> Result<usize> {
    let target = job.target();
    let mut created = 0;
    if !target.is_dir() {
        DirBuilder::new()
            .recursive(true)
            .mode(DIR_MODE)
            .create(&target)
            .map_err(|e| RbtError::message(format!("create {}: {}", target.display(), e)))?;
        created += 1;
    }
    for idx in 0..=job.retention {
        if create_dir(&job.generation_dir(idx))? {
            created += 1;
        }
    }
    if job.staging_dir().exists() {
        warn!(
            "{} exists; an earlier rotation was interrupted and needs inspection",
            job.staging_dir().display()
        );
    }
    if created > 0 {
        info!("initialized {} director(ies) under {}", created, target.display());
    }
    Ok(created)
}

fn create_dir(path: &Path) -> Result<bool> {
    match DirBuilder::new().mode(DIR_MODE).create(path) {
        Ok(()) => {
            debug!("created {}", path.display());
            Ok(true)
        }
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(false),
        Err(err) => Err(RbtError::message(format!("create {}: {}", path.display(), err))),
    }
}

/// Makes the freshly written slot `backup.<retention>` the newest generation
/// and shifts every other generation one slot older.
pub fn rotate(job: &Job) -> Result<()> {
    let staging = job.staging_dir();
    if staging.exists() {
        return Err(RbtError::message(format!(
            "{} already exists; refusing to rotate until it is inspected",
            staging.display()
        )));
    }
    rename(&job.write_slot(), &staging)?;
    for idx in (1..=job.retention).rev() {
        rename(&job.generation_dir(idx - 1), &job.generation_dir(idx))?;
    }
    rename(&staging, &job.latest_dir())?;
    info!("rotated {} generation(s) of {}", job.retention + 1, job.name);
    Ok(())
}

fn rename(from: &Path, to: &Path) -> Result<()> {
    fs::rename(from, to).map_err(|e| {
        RbtError::message(format!("rename {} -> {}: {}", from.display(), to.display(), e))
    })
}

pub fn list_generations(job: &Job) -> Result<Vec<Generation>> {
    let mut out = Vec::with_capacity(job.retention + 1);
    for index in 0..=job.retention {
        let path = job.generation_dir(index);
        let exists = path.is_dir();
        let completion = if exists {
            read_record(&job.completion_path(index))?
        } else {
            None
        };
        out.push(Generation {
            index,
            path,
            exists,
            completion,
        });
    }
    Ok(out)
}
