use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use tracing::debug;

use crate::config::model::{Job, JobConfig};
use crate::error::{ConfigError, RbtError, Result};
use crate::util::paths::{has_parent_dir, is_safe_name};

pub fn load_config(path: &Path) -> Result<Job> {
    let mut contents = String::new();
    File::open(path)
        .and_then(|mut f| f.read_to_string(&mut contents))
        .map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => {
                RbtError::Config(ConfigError::NotFound(path.display().to_string()))
            }
            _ => RbtError::message(format!("read {}: {}", path.display(), e)),
        })?;
    let cfg = parse_config(path, &contents)?;
    let job = validate(cfg)?;
    debug!(
        "loaded {}: job {} with {} source(s), retention {}",
        path.display(),
        job.name,
        job.sources.len(),
        job.retention
    );
    Ok(job)
}

fn parse_config(path: &Path, contents: &str) -> Result<JobConfig> {
    let yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let cfg: std::result::Result<JobConfig, String> = if yaml {
        serde_yaml::from_str(contents).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(contents).map_err(|e| e.to_string())
    };
    cfg.map_err(|e| ConfigError::Parse(format!("{}: {}", path.display(), e)).into())
}

fn validate(cfg: JobConfig) -> Result<Job> {
    if cfg.name.trim().is_empty() {
        return Err(ConfigError::Invalid("job name is required".to_string()).into());
    }
    if !is_safe_name(&cfg.name) {
        return Err(ConfigError::Invalid(format!(
            "job {} name must use only letters, digits, '.', '-', '_'",
            cfg.name
        ))
        .into());
    }
    let invalid = |msg: &str| -> RbtError {
        ConfigError::Invalid(format!("job {}: {}", cfg.name, msg)).into()
    };
    if cfg.backups < 1 {
        return Err(invalid("backups must be at least 1"));
    }
    if cfg.target.trim().is_empty() {
        return Err(invalid("target path is empty"));
    }
    if cfg.files.is_empty() {
        return Err(invalid("no files to back up"));
    }
    for file in &cfg.files {
        if !Path::new(file).is_absolute() {
            return Err(invalid(&format!("source {} must be absolute", file)));
        }
    }
    if cfg.exclude.iter().any(|e| e.trim().is_empty()) {
        return Err(invalid("exclude patterns must not be empty"));
    }

    let job = Job {
        name: cfg.name.clone(),
        retention: cfg.backups,
        target_template: cfg.target.clone(),
        sources: cfg.files.clone(),
        excludes: cfg.exclude.clone(),
    };
    let target = job.target();
    if !target.is_absolute() {
        return Err(invalid(&format!("target {} must be absolute", target.display())));
    }
    if has_parent_dir(&target) {
        return Err(invalid("target path must not contain .."));
    }
    Ok(job)
}
