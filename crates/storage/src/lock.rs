// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-process file locking with backoff retry and stale-lock cleanup.
//!
//! Lock state lives in a sidecar file `<root>/.locks/<basename>.lock`. The
//! OS advisory lock (fs2: flock on Unix) is the actual mutual exclusion;
//! the PID and timestamp written inside the sidecar are diagnostics for the
//! stale-steal path. Advisory locks vanish with their holder, so a crashed
//! process never wedges the system; the steal path only cleans up sidecar
//! contents left by a dead writer.

use crate::process::pid_alive;
use fs2::FileExt;
use gaffer_core::config::LockConfig;
use gaffer_core::{Category, Error, Result};
use std::fs::{self, File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Initial backoff between acquisition attempts.
const INITIAL_BACKOFF: Duration = Duration::from_millis(10);

/// Backoff cap.
const MAX_BACKOFF: Duration = Duration::from_millis(500);

/// Lock flavor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockMode {
    /// Multiple concurrent holders; excludes exclusive.
    Shared,
    /// Single holder; grants write authority on the target.
    Exclusive,
}

/// Held lock; released on drop.
#[derive(Debug)]
pub struct LockGuard {
    file: File,
    sidecar: PathBuf,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = FileExt::unlock(&self.file) {
            tracing::warn!(sidecar = %self.sidecar.display(), error = %e, "lock release failed");
        }
    }
}

/// Cross-process lock manager rooted at one state directory.
#[derive(Debug, Clone)]
pub struct LockManager {
    locks_dir: PathBuf,
    timeout: Duration,
    stale_age: Duration,
}

impl LockManager {
    pub fn new(locks_dir: impl Into<PathBuf>, cfg: &LockConfig) -> Self {
        Self {
            locks_dir: locks_dir.into(),
            timeout: Duration::from_secs(cfg.default_timeout),
            stale_age: Duration::from_secs(cfg.stale_age),
        }
    }

    /// Run `f` under the exclusive lock for `target`.
    ///
    /// The guard releases on every exit path, including panics, via Drop.
    /// The callback's return value is the authoritative outcome.
    pub fn with_write_lock<T>(&self, target: &Path, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = self.acquire(target, LockMode::Exclusive)?;
        f()
    }

    /// Run `f` under a shared lock for `target`.
    pub fn with_read_lock<T>(&self, target: &Path, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let _guard = self.acquire(target, LockMode::Shared)?;
        f()
    }

    /// Single non-blocking attempt; `lock.Busy` when contended.
    pub fn try_lock(&self, target: &Path, mode: LockMode) -> Result<LockGuard> {
        let file = self.open_sidecar(target)?;
        let sidecar = self.sidecar_path(target);
        match try_lock_file(&file, mode) {
            Ok(()) => {
                if mode == LockMode::Exclusive {
                    write_diagnostics(&file);
                }
                Ok(LockGuard { file, sidecar })
            }
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => Err(Error::new(
                "lock.Busy",
                Category::Transient,
                "lock is held by another process",
            )
            .with_context("sidecar", sidecar.display())),
            Err(e) => Err(fs_failure(&sidecar, e)),
        }
    }

    /// Write `bytes` to `target` atomically under the exclusive lock.
    pub fn atomic_write(&self, target: &Path, bytes: &[u8]) -> Result<()> {
        self.with_write_lock(target, || {
            crate::atomic::atomic_write(target, bytes)
                .map_err(|e| gaffer_core::error::io_error("fs.IO", target, e))
        })
    }

    /// Blocking acquisition with exponential backoff up to the configured
    /// timeout.
    pub fn acquire(&self, target: &Path, mode: LockMode) -> Result<LockGuard> {
        let sidecar = self.sidecar_path(target);
        let file = self.open_sidecar(target)?;
        let deadline = Instant::now() + self.timeout;
        let mut backoff = INITIAL_BACKOFF;

        loop {
            match try_lock_file(&file, mode) {
                Ok(()) => {
                    if mode == LockMode::Exclusive {
                        write_diagnostics(&file);
                    }
                    return Ok(LockGuard { file, sidecar });
                }
                Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    self.try_steal_stale(&sidecar, &file);
                }
                Err(e) => return Err(fs_failure(&sidecar, e)),
            }

            if Instant::now() >= deadline {
                return Err(Error::new(
                    "lock.Timeout",
                    Category::Transient,
                    format!("lock not acquired within {}s", self.timeout.as_secs()),
                )
                .with_context("sidecar", sidecar.display())
                .with_hint("another process may be wedged; check its PID in the sidecar file"));
            }

            std::thread::sleep(backoff);
            backoff = (backoff * 2).min(MAX_BACKOFF);
        }
    }

    fn sidecar_path(&self, target: &Path) -> PathBuf {
        let basename = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "root".to_string());
        self.locks_dir.join(format!("{}.lock", basename))
    }

    fn open_sidecar(&self, target: &Path) -> Result<File> {
        ensure_locks_dir(&self.locks_dir)?;
        let sidecar = self.sidecar_path(target);
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&sidecar)
            .map_err(|e| fs_failure(&sidecar, e))
    }

    /// Stale sidecar cleanup: if the recorded PID is gone and the sidecar
    /// has not been touched within `stale_age`, truncate the leftover
    /// diagnostics under a short non-blocking exclusive acquisition.
    fn try_steal_stale(&self, sidecar: &Path, file: &File) {
        let Some((pid, _)) = read_diagnostics(file) else {
            return;
        };
        if pid_alive(pid) {
            return;
        }
        let age = fs::metadata(sidecar)
            .and_then(|m| m.modified())
            .ok()
            .and_then(|t| t.elapsed().ok());
        let Some(age) = age else { return };
        if age < self.stale_age {
            return;
        }
        if FileExt::try_lock_exclusive(file).is_ok() {
            tracing::warn!(
                sidecar = %sidecar.display(),
                stale_pid = pid,
                age_secs = age.as_secs(),
                "stealing stale lock"
            );
            let _ = file.set_len(0);
            let _ = FileExt::unlock(file);
        }
    }
}

fn ensure_locks_dir(dir: &Path) -> Result<()> {
    if dir.exists() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|e| fs_failure(dir, e))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = fs::set_permissions(dir, fs::Permissions::from_mode(0o700));
    }
    Ok(())
}

// Fully qualified fs2 calls avoid colliding with the std file-lock methods.
fn try_lock_file(file: &File, mode: LockMode) -> std::io::Result<()> {
    match mode {
        LockMode::Exclusive => FileExt::try_lock_exclusive(file),
        LockMode::Shared => FileExt::try_lock_shared(file),
    }
}

/// Record `pid epoch_secs` in the sidecar for the stale-steal path.
fn write_diagnostics(file: &File) {
    let mut f = file;
    let epoch = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs();
    let _ = f.set_len(0);
    let _ = f.seek(SeekFrom::Start(0));
    let _ = write!(f, "{} {}", std::process::id(), epoch);
    let _ = f.flush();
}

fn read_diagnostics(file: &File) -> Option<(u32, u64)> {
    let mut f = file;
    f.seek(SeekFrom::Start(0)).ok()?;
    let mut text = String::new();
    f.read_to_string(&mut text).ok()?;
    let mut parts = text.split_whitespace();
    let pid = parts.next()?.parse().ok()?;
    let ts = parts.next()?.parse().ok()?;
    Some((pid, ts))
}

fn fs_failure(path: &Path, e: std::io::Error) -> Error {
    Error::new(
        "lock.FilesystemFailure",
        Category::System,
        e.to_string(),
    )
    .with_context("path", path.display())
    .with_cause(e)
}

#[cfg(test)]
#[path = "lock_tests.rs"]
mod tests;
