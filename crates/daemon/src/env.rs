// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;
use std::time::Duration;

use crate::lifecycle::LifecycleError;

/// Resolve the runtime directory holding the socket, lock, and state files:
/// `MCPX_RUNTIME_DIR` > `$XDG_RUNTIME_DIR/mcpx` > `$XDG_STATE_HOME/mcpx` >
/// `~/.local/state/mcpx`.
pub fn runtime_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("MCPX_RUNTIME_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_RUNTIME_DIR") {
        return Ok(PathBuf::from(xdg).join("mcpx"));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("mcpx"));
    }
    let home = dirs::home_dir().ok_or(LifecycleError::NoRuntimeDir)?;
    Ok(home.join(".local/state/mcpx"))
}

/// Resolve the response cache directory: `MCPX_CACHE_DIR` >
/// `$XDG_CACHE_HOME/mcpx` > `~/.cache/mcpx`.
pub fn cache_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("MCPX_CACHE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        return Ok(PathBuf::from(xdg).join("mcpx"));
    }
    let base = dirs::cache_dir().ok_or(LifecycleError::NoRuntimeDir)?;
    Ok(base.join("mcpx"))
}

/// Per-server idle timeout before the pool connection is closed
/// (default 60s, configurable via `MCPX_IDLE_TIMEOUT`, e.g. "90s").
pub fn idle_timeout() -> Duration {
    std::env::var("MCPX_IDLE_TIMEOUT")
        .ok()
        .and_then(|s| humantime::parse_duration(&s).ok())
        .unwrap_or(Duration::from_secs(60))
}

/// How long a client waits for a freshly spawned daemon to become ready
/// (default 5s, configurable via `MCPX_SPAWN_WAIT`).
pub fn spawn_wait() -> Duration {
    std::env::var("MCPX_SPAWN_WAIT")
        .ok()
        .and_then(|s| humantime::parse_duration(&s).ok())
        .unwrap_or(Duration::from_secs(5))
}

/// Poll interval while waiting for daemon readiness.
pub const SPAWN_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Log filter directive for the daemon (`MCPX_LOG`, EnvFilter syntax).
pub fn log_filter() -> String {
    std::env::var("MCPX_LOG").unwrap_or_else(|_| "info".to_string())
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
