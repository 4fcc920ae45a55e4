use std::path::{Component, Path, PathBuf};

pub const NAME_PLACEHOLDER: &str = "$name";
pub const LOCK_FILE_NAME: &str = "backup.lock";
pub const COMPLETION_FILE_NAME: &str = "completed";
pub const STAGING_DIR_NAME: &str = "backup.tmp";

pub fn is_safe_name(name: &str) -> bool {
    if name.is_empty() || name == "." || name == ".." {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
}

pub fn has_parent_dir(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}

pub fn generation_name(idx: usize) -> String {
    format!("backup.{}", idx)
}

pub fn generation_dir(target: &Path, idx: usize) -> PathBuf {
    target.join(generation_name(idx))
}
