// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawn coordination: ensure exactly one daemon per user.
//!
//! Racing clients serialize on an advisory file lock held for the duration
//! of the handshake. Under the lock the client probes any existing daemon
//! through the real socket — so half-dead daemons (stale socket, rotated
//! nonce) are detected the same way real traffic would hit them — and
//! spawns a fresh one only when the probe fails.

use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};
use std::time::Instant;

use fs2::FileExt as _;
use thiserror::Error;
use tokio::net::UnixStream;

use mcpx_daemon::env;
use mcpx_daemon::lifecycle::Paths;
use mcpx_daemon::protocol::{self, Request, Response};

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("daemon did not become ready within {0}")]
    Timeout(humantime::Duration),

    #[error("could not locate the mcpxd binary")]
    NoDaemonBinary,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

enum ProbeResult {
    /// The daemon answered and accepted our nonce.
    Healthy,
    /// The daemon answered but rejected the nonce.
    NonceMismatch,
    /// Nothing usable is listening on the socket.
    NotListening,
}

/// Ensure a daemon is running and return the nonce that authenticates
/// against it.
pub async fn spawn_or_connect(paths: &Paths) -> Result<String, SpawnError> {
    std::fs::create_dir_all(&paths.runtime_dir)?;

    // All steps below run under the lock; it releases when the guard drops.
    let _lock = acquire_spawn_lock(&paths.lock_path)?;

    if let Some(nonce) = read_nonce(&paths.state_path) {
        match probe(paths, &nonce).await {
            ProbeResult::Healthy => return Ok(nonce),
            ProbeResult::NonceMismatch => {
                // The daemon may have just restarted and rewritten the
                // state file; re-read once before declaring it dead.
                let retried = match read_nonce(&paths.state_path) {
                    Some(fresh) if fresh != nonce => {
                        matches!(probe(paths, &fresh).await, ProbeResult::Healthy)
                            .then_some(fresh)
                    }
                    _ => None,
                };
                if let Some(fresh) = retried {
                    return Ok(fresh);
                }
                // Half-dead daemon: clear its files and respawn.
                let _ = std::fs::remove_file(&paths.socket_path);
                let _ = std::fs::remove_file(&paths.state_path);
            }
            ProbeResult::NotListening => {}
        }
    }

    spawn_daemon()?;
    wait_ready(paths).await
}

fn acquire_spawn_lock(path: &Path) -> Result<File, SpawnError> {
    let file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    file.lock_exclusive()?;
    Ok(file)
}

fn read_nonce(path: &Path) -> Option<String> {
    let text = std::fs::read_to_string(path).ok()?;
    let nonce = text.trim().to_string();
    (!nonce.is_empty()).then_some(nonce)
}

/// Probe the daemon with a real request on the real socket.
async fn probe(paths: &Paths, nonce: &str) -> ProbeResult {
    let Ok(mut stream) = UnixStream::connect(&paths.socket_path).await else {
        return ProbeResult::NotListening;
    };

    let mut request = Request::bare(nonce, Request::LIST_SERVERS);
    request.cwd = current_dir_string();

    if protocol::write_value(&mut stream, &request).await.is_err() {
        return ProbeResult::NotListening;
    }
    match protocol::read_value::<_, Response>(&mut stream).await {
        Ok(response) if response.stderr.contains("nonce mismatch") => ProbeResult::NonceMismatch,
        Ok(_) => ProbeResult::Healthy,
        Err(_) => ProbeResult::NotListening,
    }
}

/// Spawn the daemon detached, stdio to /dev/null, and do not wait.
fn spawn_daemon() -> Result<(), SpawnError> {
    let binary = find_daemon_binary().ok_or(SpawnError::NoDaemonBinary)?;
    Command::new(binary)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;
    Ok(())
}

/// Prefer a sibling of the current executable, then fall back to PATH.
fn find_daemon_binary() -> Option<std::path::PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("mcpxd");
            if sibling.is_file() {
                return Some(sibling);
            }
        }
    }
    Some(std::path::PathBuf::from("mcpxd"))
}

/// Poll until the state file holds a nonce and the socket accepts.
async fn wait_ready(paths: &Paths) -> Result<String, SpawnError> {
    let deadline = Instant::now() + env::spawn_wait();
    loop {
        if let Some(nonce) = read_nonce(&paths.state_path) {
            if UnixStream::connect(&paths.socket_path).await.is_ok() {
                return Ok(nonce);
            }
        }
        if Instant::now() >= deadline {
            return Err(SpawnError::Timeout(env::spawn_wait().into()));
        }
        tokio::time::sleep(env::SPAWN_POLL_INTERVAL).await;
    }
}

pub(crate) fn current_dir_string() -> String {
    std::env::current_dir().map(|dir| dir.display().to_string()).unwrap_or_default()
}

#[cfg(test)]
#[path = "daemon_process_tests.rs"]
mod tests;
