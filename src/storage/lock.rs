//! At most one build per corpus

use crate::error::{LexicaError, Result};
use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = ".build.lock";

/// Exclusive build lock, released on drop
///
/// The lock file records the owning pid. A lock whose owner is no longer
/// running is reclaimed by the next build.
#[derive(Debug)]
pub struct BuildLock {
    path: PathBuf,
}

impl BuildLock {
    /// Create the lock file, failing if a live build holds it
    pub fn acquire(corpus_dir: &Path, corpus_id: &str) -> Result<Self> {
        let path = corpus_dir.join(LOCK_FILE);

        let file = match create_lock_file(&path)? {
            Some(file) => file,
            None => {
                let Some(pid) = stale_owner(&path) else {
                    return Err(in_progress(corpus_id));
                };
                tracing::warn!(
                    "Reclaiming build lock of corpus {} left by exited process {}",
                    corpus_id,
                    pid
                );
                match fs::remove_file(&path) {
                    Ok(()) => {}
                    Err(e) if e.kind() == ErrorKind::NotFound => {}
                    Err(e) => {
                        return Err(LexicaError::io(
                            e,
                            format!("Failed to remove stale build lock: {}", path.display()),
                        ))
                    }
                }
                create_lock_file(&path)?.ok_or_else(|| in_progress(corpus_id))?
            }
        };

        let lock = Self { path };
        lock.write_owner(file)?;

        tracing::debug!("Acquired build lock for corpus {}", corpus_id);
        Ok(lock)
    }

    fn write_owner(&self, mut file: File) -> Result<()> {
        writeln!(
            file,
            "pid={} started={}",
            std::process::id(),
            chrono::Utc::now().to_rfc3339()
        )
        .and_then(|_| file.sync_all())
        .map_err(|e| LexicaError::io(e, "Failed to write build lock"))
    }
}

impl Drop for BuildLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            tracing::warn!("Failed to release build lock {}: {}", self.path.display(), e);
        }
    }
}

/// `None` when the file already exists
fn create_lock_file(path: &Path) -> Result<Option<File>> {
    match OpenOptions::new().write(true).create_new(true).open(path) {
        Ok(file) => Ok(Some(file)),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Ok(None),
        Err(e) => Err(LexicaError::io(
            e,
            format!("Failed to create build lock: {}", path.display()),
        )),
    }
}

/// Pid recorded in an existing lock file, if that process has exited
///
/// An unreadable lock, or one without a pid, counts as held.
fn stale_owner(path: &Path) -> Option<i32> {
    let content = fs::read_to_string(path).ok()?;
    let pid = owner_pid(&content)?;
    (!is_running(pid)).then_some(pid)
}

fn owner_pid(content: &str) -> Option<i32> {
    content
        .split_whitespace()
        .find_map(|field| field.strip_prefix("pid="))
        .and_then(|pid| pid.parse().ok())
        .filter(|pid| *pid > 0)
}

/// Signal 0 probes for the process without touching it
fn is_running(pid: i32) -> bool {
    !matches!(kill(Pid::from_raw(pid), None), Err(Errno::ESRCH))
}

fn in_progress(corpus_id: &str) -> LexicaError {
    LexicaError::BuildInProgress {
        corpus: corpus_id.to_string(),
    }
}
