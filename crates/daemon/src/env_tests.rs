// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use serial_test::serial;

use super::*;

#[test]
#[serial]
fn runtime_dir_prefers_explicit_override() {
    std::env::set_var("MCPX_RUNTIME_DIR", "/custom/runtime");
    assert_eq!(runtime_dir().unwrap(), std::path::PathBuf::from("/custom/runtime"));
    std::env::remove_var("MCPX_RUNTIME_DIR");
}

#[test]
#[serial]
fn runtime_dir_falls_back_to_xdg_runtime() {
    std::env::remove_var("MCPX_RUNTIME_DIR");
    std::env::set_var("XDG_RUNTIME_DIR", "/run/user/1000");
    assert_eq!(runtime_dir().unwrap(), std::path::PathBuf::from("/run/user/1000/mcpx"));
    std::env::remove_var("XDG_RUNTIME_DIR");
}

#[test]
#[serial]
fn cache_dir_honors_xdg_cache_home() {
    std::env::remove_var("MCPX_CACHE_DIR");
    std::env::set_var("XDG_CACHE_HOME", "/custom/cache");
    assert_eq!(cache_dir().unwrap(), std::path::PathBuf::from("/custom/cache/mcpx"));
    std::env::remove_var("XDG_CACHE_HOME");
}

#[test]
#[serial]
fn idle_timeout_defaults_to_sixty_seconds() {
    std::env::remove_var("MCPX_IDLE_TIMEOUT");
    assert_eq!(idle_timeout(), Duration::from_secs(60));
}

#[test]
#[serial]
fn idle_timeout_parses_humantime() {
    std::env::set_var("MCPX_IDLE_TIMEOUT", "90s");
    assert_eq!(idle_timeout(), Duration::from_secs(90));

    // Garbage falls back to the default rather than failing startup.
    std::env::set_var("MCPX_IDLE_TIMEOUT", "ninety");
    assert_eq!(idle_timeout(), Duration::from_secs(60));
    std::env::remove_var("MCPX_IDLE_TIMEOUT");
}

#[test]
#[serial]
fn spawn_wait_is_configurable() {
    std::env::remove_var("MCPX_SPAWN_WAIT");
    assert_eq!(spawn_wait(), Duration::from_secs(5));

    std::env::set_var("MCPX_SPAWN_WAIT", "500ms");
    assert_eq!(spawn_wait(), Duration::from_millis(500));
    std::env::remove_var("MCPX_SPAWN_WAIT");
}
