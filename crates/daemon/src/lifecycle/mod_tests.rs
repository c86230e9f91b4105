// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::os::unix::fs::PermissionsExt;

use tempfile::tempdir;

use super::*;

fn test_paths(dir: &Path) -> Paths {
    Paths {
        runtime_dir: dir.to_path_buf(),
        socket_path: dir.join("daemon.sock"),
        lock_path: dir.join("daemon.lock"),
        pid_path: dir.join("daemon.pid"),
        state_path: dir.join("daemon.state"),
        log_path: dir.join("daemon.log"),
        cache_dir: dir.join("cache"),
    }
}

#[tokio::test]
async fn startup_creates_socket_state_and_lock() {
    let dir = tempdir().unwrap();
    let paths = test_paths(dir.path());

    let (state, _listener) = startup(&paths).unwrap();

    assert!(paths.socket_path.exists());
    assert!(paths.state_path.exists());
    assert!(paths.pid_path.exists());

    // Nonce: 16 bytes as lowercase hex, one line.
    let written = std::fs::read_to_string(&paths.state_path).unwrap();
    assert_eq!(written.trim(), state.nonce);
    assert_eq!(state.nonce.len(), 32);
    assert!(state.nonce.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));

    // The pid file holds our pid.
    let pid: u32 = std::fs::read_to_string(&paths.pid_path).unwrap().trim().parse().unwrap();
    assert_eq!(pid, std::process::id());
}

#[tokio::test]
async fn socket_and_state_are_private() {
    let dir = tempdir().unwrap();
    let paths = test_paths(dir.path());

    let (_state, _listener) = startup(&paths).unwrap();

    let socket_mode = std::fs::metadata(&paths.socket_path).unwrap().permissions().mode();
    assert_eq!(socket_mode & 0o777, 0o600, "socket must be 0600");

    let state_mode = std::fs::metadata(&paths.state_path).unwrap().permissions().mode();
    assert_eq!(state_mode & 0o777, 0o600, "state file must be 0600");

    let dir_mode = std::fs::metadata(&paths.runtime_dir).unwrap().permissions().mode();
    assert_eq!(dir_mode & 0o777, 0o700, "runtime dir must be 0700");
}

#[tokio::test]
async fn second_startup_loses_the_lock_and_preserves_files() {
    let dir = tempdir().unwrap();
    let paths = test_paths(dir.path());

    let (first, _listener) = startup(&paths).unwrap();
    let nonce_before = std::fs::read_to_string(&paths.state_path).unwrap();

    let second = startup(&paths);
    assert!(matches!(second, Err(LifecycleError::LockFailed(_))));

    // The loser must not clobber the winner's files.
    assert!(paths.socket_path.exists());
    assert_eq!(std::fs::read_to_string(&paths.state_path).unwrap(), nonce_before);
    drop(first);
}

#[tokio::test]
async fn startup_replaces_a_stale_socket() {
    let dir = tempdir().unwrap();
    let paths = test_paths(dir.path());

    // A crashed daemon left its socket file behind.
    std::fs::write(&paths.socket_path, b"").unwrap();

    let (_state, _listener) = startup(&paths).unwrap();
    assert!(paths.socket_path.exists(), "fresh socket bound over the stale one");
}

#[tokio::test]
async fn shutdown_removes_runtime_files() {
    let dir = tempdir().unwrap();
    let paths = test_paths(dir.path());

    let (state, listener) = startup(&paths).unwrap();
    drop(listener);
    state.shutdown();

    assert!(!paths.socket_path.exists());
    assert!(!paths.state_path.exists());
    assert!(!paths.pid_path.exists());
}

#[tokio::test]
async fn nonces_are_unique_per_startup() {
    let dir_a = tempdir().unwrap();
    let dir_b = tempdir().unwrap();

    let (a, _la) = startup(&test_paths(dir_a.path())).unwrap();
    let (b, _lb) = startup(&test_paths(dir_b.path())).unwrap();
    assert_ne!(a.nonce, b.nonce);
}

#[test]
fn paths_follow_runtime_dir_override() {
    // MCPX_RUNTIME_DIR is the test seam; exercised via env.rs directly to
    // avoid mutating process env in parallel tests.
    let paths = test_paths(Path::new("/tmp/mcpx-test"));
    assert_eq!(paths.socket_path, Path::new("/tmp/mcpx-test/daemon.sock"));
    assert_eq!(paths.state_path, Path::new("/tmp/mcpx-test/daemon.state"));
    assert_eq!(paths.lock_path, Path::new("/tmp/mcpx-test/daemon.lock"));
}
