// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle: runtime paths, single-instance lock, nonce, socket.
//!
//! Startup order matters. The pid lock is taken first so a lost race
//! cannot clobber the winner's files; the state file (nonce) is written
//! before the socket binds so a client that can connect can always also
//! read the nonce.

use std::fs::File;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use fs2::FileExt as _;
use rand::RngCore as _;
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

use crate::env;

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine runtime directory")]
    NoRuntimeDir,

    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Filesystem layout for one user's daemon.
#[derive(Debug, Clone)]
pub struct Paths {
    /// Directory holding socket, lock, and state files (0700).
    pub runtime_dir: PathBuf,
    /// Unix socket (0600).
    pub socket_path: PathBuf,
    /// Client-side spawn coordination lock; held only during spawn.
    pub lock_path: PathBuf,
    /// Daemon-held pid lock; exclusive for the daemon's lifetime.
    pub pid_path: PathBuf,
    /// One line, hex nonce (0600).
    pub state_path: PathBuf,
    /// Daemon log file.
    pub log_path: PathBuf,
    /// Response cache root.
    pub cache_dir: PathBuf,
}

impl Paths {
    pub fn load() -> Result<Self, LifecycleError> {
        let runtime_dir = env::runtime_dir()?;
        Ok(Self {
            socket_path: runtime_dir.join("daemon.sock"),
            lock_path: runtime_dir.join("daemon.lock"),
            pid_path: runtime_dir.join("daemon.pid"),
            state_path: runtime_dir.join("daemon.state"),
            log_path: runtime_dir.join("daemon.log"),
            cache_dir: env::cache_dir()?,
            runtime_dir,
        })
    }
}

/// Live daemon state. Dropping releases the pid lock.
pub struct DaemonState {
    pub paths: Paths,
    // NOTE(lifetime): held to maintain the exclusive pid lock
    #[allow(dead_code)]
    pid_file: File,
    pub nonce: String,
}

/// Start the daemon: lock, nonce, state file, socket.
pub fn startup(paths: &Paths) -> Result<(DaemonState, UnixListener), LifecycleError> {
    match startup_inner(paths) {
        Ok(result) => Ok(result),
        Err(e) => {
            // A lock failure means another daemon owns these files.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(paths);
            }
            Err(e)
        }
    }
}

fn startup_inner(paths: &Paths) -> Result<(DaemonState, UnixListener), LifecycleError> {
    std::fs::create_dir_all(&paths.runtime_dir)?;
    set_mode(&paths.runtime_dir, 0o700)?;

    // Open without truncating: the file may belong to a running daemon
    // whose pid we must not wipe before we hold the lock.
    let mut pid_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&paths.pid_path)?;
    pid_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    pid_file.set_len(0)?;
    writeln!(pid_file, "{}", std::process::id())?;

    let nonce = generate_nonce();
    write_state_file(&paths.state_path, &nonce)?;

    if paths.socket_path.exists() {
        std::fs::remove_file(&paths.socket_path)?;
    }
    let listener = UnixListener::bind(&paths.socket_path)
        .map_err(|e| LifecycleError::BindFailed(paths.socket_path.clone(), e))?;
    set_mode(&paths.socket_path, 0o600)?;

    info!(socket = %paths.socket_path.display(), "daemon started");
    Ok((DaemonState { paths: paths.clone(), pid_file, nonce }, listener))
}

impl DaemonState {
    /// Remove the socket and state files. The pid lock releases on drop.
    pub fn shutdown(&self) {
        info!("shutting down daemon");
        for path in [&self.paths.socket_path, &self.paths.state_path, &self.paths.pid_path] {
            if path.exists() {
                if let Err(e) = std::fs::remove_file(path) {
                    warn!(path = %path.display(), error = %e, "failed to remove");
                }
            }
        }
    }
}

/// 16 random bytes, lowercase hex.
fn generate_nonce() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// One line, mode 0600, written atomically so a polling client never
/// observes a partial nonce.
fn write_state_file(path: &Path, nonce: &str) -> Result<(), LifecycleError> {
    let dir = path.parent().ok_or(LifecycleError::NoRuntimeDir)?;
    let tmp = tempfile::NamedTempFile::new_in(dir)?;
    {
        use std::io::Write as _;
        let mut file = tmp.as_file();
        writeln!(file, "{nonce}")?;
    }
    set_mode(tmp.path(), 0o600)?;
    tmp.persist(path).map_err(|e| LifecycleError::Io(e.error))?;
    Ok(())
}

fn cleanup_on_failure(paths: &Paths) {
    for path in [&paths.socket_path, &paths.state_path, &paths.pid_path] {
        if path.exists() {
            let _ = std::fs::remove_file(path);
        }
    }
}

fn set_mode(path: &Path, mode: u32) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(mode))
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
