use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};

pub const CONFIG_DIR: &str = "/etc/rbt";
pub const PROGRAM_NAME: &str = "rbt";

const CONFIG_EXTENSIONS: [&str; 3] = [".json", ".yaml", ".yml"];

/// Resolves a job identifier to a config file, first as given, then under `search_dir`.
pub fn resolve_config(identifier: &str, search_dir: &Path) -> Result<PathBuf> {
    let file = if CONFIG_EXTENSIONS.iter().any(|ext| identifier.ends_with(ext)) {
        identifier.to_string()
    } else {
        format!("{}.json", identifier)
    };
    let direct = PathBuf::from(&file);
    if exists(&direct)? {
        return Ok(direct);
    }
    let in_dir = search_dir.join(&file);
    if exists(&in_dir)? {
        return Ok(in_dir);
    }
    Err(ConfigError::NotFound(file).into())
}

/// Job identifier implied by the program name when invoked through a symlink
/// such as `/usr/local/bin/home -> rbt`.
pub fn identifier_from_program(argv0: &str) -> Option<String> {
    let base = Path::new(argv0).file_name()?.to_string_lossy().to_string();
    if base.is_empty() || base.ends_with(PROGRAM_NAME) {
        return None;
    }
    Some(base)
}

fn exists(path: &Path) -> Result<bool> {
    match fs::metadata(path) {
        Ok(_) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
        Err(err) => Err(err.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RbtError;
    use tempfile::TempDir;

    #[test]
    fn resolves_in_search_dir_with_json_suffix() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("rbt-locate-test-home.json");
        fs::write(&path, "{}").expect("write");
        let found = resolve_config("rbt-locate-test-home", dir.path()).expect("resolve");
        assert_eq!(found, path);
    }

    #[test]
    fn explicit_path_wins() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("mail.yaml");
        fs::write(&path, "name: mail").expect("write");
        let found = resolve_config(path.to_str().expect("utf8"), Path::new("/nonexistent"))
            .expect("resolve");
        assert_eq!(found, path);
    }

    #[test]
    fn missing_config_is_not_found() {
        let dir = TempDir::new().expect("tempdir");
        let err = resolve_config("rbt-locate-test-missing", dir.path()).unwrap_err();
        assert!(matches!(err, RbtError::Config(ConfigError::NotFound(_))));
    }

    #[test]
    fn program_name_identifies_job() {
        assert_eq!(identifier_from_program("/usr/local/bin/home"), Some("home".to_string()));
        assert_eq!(identifier_from_program("/usr/bin/rbt"), None);
        assert_eq!(identifier_from_program("rbt"), None);
    }
}
