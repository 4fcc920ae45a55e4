//! Per-job advisory lock on `<target>/backup.lock`.
//!
//! A free lock is taken with `LOCK_NB` right away. Otherwise `flock(LOCK_EX)`
//! blocks, so acquisition runs on its own thread and is raced against a timer
//! on the caller's side. When the timer wins, a detached thread
//! keeps waiting and drops the lock as soon as it is granted.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
use std::os::unix::io::AsRawFd;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tracing::{debug, warn};

use crate::error::{RbtError, Result};

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(60);
const LOCK_FILE_MODE: u32 = 0o644;

/// Holds the exclusive lock until dropped.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    path: PathBuf,
}

impl LockGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(err) = flock(&self.file, libc::LOCK_UN) {
            warn!("unlock {}: {}", self.path.display(), err);
        } else {
            debug!("released lock {}", self.path.display());
        }
    }
}

/// Creates the lock file if it is missing. The file is never removed.
pub fn ensure_lock_file_exists(path: &Path) -> Result<()> {
    match fs::metadata(path) {
        Ok(_) => return Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(lock_error(path, err)),
    }
    match OpenOptions::new()
        .write(true)
        .create_new(true)
        .mode(LOCK_FILE_MODE)
        .open(path)
    {
        Ok(file) => {
            file.set_permissions(fs::Permissions::from_mode(LOCK_FILE_MODE))
                .map_err(|e| lock_error(path, e))?;
            debug!("created lock file {}", path.display());
            Ok(())
        }
        // another process created it between our stat and open
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => Ok(()),
        Err(err) => Err(lock_error(path, err)),
    }
}

fn open_lock_file(path: &Path) -> Result<File> {
    match File::open(path) {
        Ok(file) => Ok(file),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            // removed behind our back; recreate and retry once
            ensure_lock_file_exists(path)?;
            File::open(path).map_err(|e| lock_error(path, e))
        }
        Err(err) => Err(lock_error(path, err)),
    }
}

/// Acquires the exclusive lock on `path`, giving up after `timeout`.
pub fn acquire(path: &Path, timeout: Duration) -> Result<LockGuard> {
    ensure_lock_file_exists(path)?;
    let file = open_lock_file(path)?;

    // uncontended: take it right away so a zero timeout cannot lose the race
    match flock(&file, libc::LOCK_EX | libc::LOCK_NB) {
        Ok(()) => {
            debug!("acquired lock {}", path.display());
            return Ok(LockGuard {
                file,
                path: path.to_path_buf(),
            });
        }
        Err(err) if err.kind() == io::ErrorKind::WouldBlock => {
            debug!("lock {} is held; waiting", path.display());
        }
        Err(err) => return Err(lock_error(path, err)),
    }

    let (tx, rx) = mpsc::sync_channel::<io::Result<File>>(1);
    thread::spawn(move || {
        let result = flock(&file, libc::LOCK_EX).map(|()| file);
        // the receiver may be gone; the releaser below owns cleanup then
        let _ = tx.send(result);
    });

    match rx.recv_timeout(timeout) {
        Ok(Ok(file)) => {
            debug!("acquired lock {}", path.display());
            Ok(LockGuard {
                file,
                path: path.to_path_buf(),
            })
        }
        Ok(Err(err)) => Err(lock_error(path, err)),
        Err(mpsc::RecvTimeoutError::Timeout) => {
            let late_path = path.to_path_buf();
            thread::spawn(move || {
                if let Ok(Ok(file)) = rx.recv() {
                    let _ = flock(&file, libc::LOCK_UN);
                    debug!("released late lock {}", late_path.display());
                }
            });
            warn!(
                "timed out after {}s waiting for lock {}",
                timeout.as_secs(),
                path.display()
            );
            Err(RbtError::LockTimeout {
                path: path.to_path_buf(),
                timeout,
            })
        }
        Err(mpsc::RecvTimeoutError::Disconnected) => Err(lock_error(
            path,
            io::Error::other("lock thread exited without a result"),
        )),
    }
}

/// Runs `action` while holding the lock on `path`. The lock is released before
/// the action's result is returned, whether it succeeded or not.
pub fn run_exclusive<T, F>(path: &Path, timeout: Duration, action: F) -> Result<T>
where
    F: FnOnce() -> Result<T>,
{
    let guard = acquire(path, timeout)?;
    let result = action();
    drop(guard);
    result
}

fn flock(file: &File, operation: libc::c_int) -> io::Result<()> {
    loop {
        // SAFETY: the descriptor belongs to `file`, which outlives the call.
        let rc = unsafe { libc::flock(file.as_raw_fd(), operation) };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

fn lock_error(path: &Path, source: io::Error) -> RbtError {
    RbtError::LockFile {
        path: path.to_path_buf(),
        source,
    }
}
