// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use tempfile::tempdir;

use super::*;

#[test]
fn key_is_a_pure_function_of_the_triple() {
    let a = ResponseCache::key("github", "search", br#"{"q":"mcp"}"#);
    let b = ResponseCache::key("github", "search", br#"{"q":"mcp"}"#);
    assert_eq!(a, b);
    assert_eq!(a.len(), 32);
    assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
}

#[test]
fn key_distinguishes_each_component() {
    let base = ResponseCache::key("server", "tool", b"{}");
    assert_ne!(base, ResponseCache::key("server2", "tool", b"{}"));
    assert_ne!(base, ResponseCache::key("server", "tool2", b"{}"));
    assert_ne!(base, ResponseCache::key("server", "tool", b"{ }"));
}

#[test]
fn nul_separator_prevents_field_bleed() {
    // "ab" + "c" must not collide with "a" + "bc".
    assert_ne!(
        ResponseCache::key("ab", "c", b""),
        ResponseCache::key("a", "bc", b""),
    );
}

#[test]
fn put_then_get_within_ttl_returns_value() {
    let dir = tempdir().unwrap();
    let cache = ResponseCache::new(dir.path());

    cache
        .put("s", "t", b"{}", b"result\n", ExitCode::Ok, Duration::from_secs(60))
        .unwrap();

    let (content, exit_code) = cache.get("s", "t", b"{}").unwrap();
    assert_eq!(content, b"result\n");
    assert_eq!(exit_code, ExitCode::Ok);
}

#[test]
fn expired_entry_misses_and_deletes_the_file() {
    let dir = tempdir().unwrap();
    let cache = ResponseCache::new(dir.path());

    cache.put("s", "t", b"{}", b"old\n", ExitCode::Ok, Duration::from_millis(20)).unwrap();
    let path = dir.path().join("responses").join(format!("{}.json", ResponseCache::key("s", "t", b"{}")));
    assert!(path.exists());

    std::thread::sleep(Duration::from_millis(40));
    assert!(cache.get("s", "t", b"{}").is_none());
    assert!(!path.exists(), "expired entry should be unlinked on read");
}

#[test]
fn malformed_entry_misses_and_deletes_the_file() {
    let dir = tempdir().unwrap();
    let cache = ResponseCache::new(dir.path());

    let responses = dir.path().join("responses");
    std::fs::create_dir_all(&responses).unwrap();
    let path = responses.join(format!("{}.json", ResponseCache::key("s", "t", b"")));
    std::fs::write(&path, b"{ corrupted").unwrap();

    assert!(cache.get("s", "t", b"").is_none());
    assert!(!path.exists());
}

#[test]
fn get_metadata_reports_age_and_ttl() {
    let dir = tempdir().unwrap();
    let cache = ResponseCache::new(dir.path());

    cache.put("s", "t", b"", b"x\n", ExitCode::Ok, Duration::from_secs(300)).unwrap();
    let (age, ttl) = cache.get_metadata("s", "t", b"").unwrap();
    assert!(age < Duration::from_secs(5), "fresh entry, age was {age:?}");
    assert!(
        ttl >= Duration::from_secs(299) && ttl <= Duration::from_secs(301),
        "ttl was {ttl:?}"
    );
}

#[test]
fn get_metadata_falls_back_to_mtime_for_legacy_entries() {
    let dir = tempdir().unwrap();
    let cache = ResponseCache::new(dir.path());

    // A legacy entry without a created field.
    let responses = dir.path().join("responses");
    std::fs::create_dir_all(&responses).unwrap();
    let path = responses.join(format!("{}.json", ResponseCache::key("s", "t", b"")));
    let expires = chrono::Utc::now() + chrono::Duration::seconds(120);
    std::fs::write(
        &path,
        serde_json::json!({
            "content": "eA==",
            "exit_code": 0,
            "expires": expires.to_rfc3339(),
        })
        .to_string(),
    )
    .unwrap();

    let (age, _ttl) = cache.get_metadata("s", "t", b"").unwrap();
    assert!(age < Duration::from_secs(5), "mtime-based age was {age:?}");
}

#[test]
fn tool_error_exit_code_round_trips() {
    let dir = tempdir().unwrap();
    let cache = ResponseCache::new(dir.path());

    cache.put("s", "t", b"", b"err\n", ExitCode::ToolError, Duration::from_secs(60)).unwrap();
    let (_, exit_code) = cache.get("s", "t", b"").unwrap();
    assert_eq!(exit_code, ExitCode::ToolError);
}

#[test]
fn entry_file_mode_is_private() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let cache = ResponseCache::new(dir.path());
    cache.put("s", "t", b"", b"x\n", ExitCode::Ok, Duration::from_secs(60)).unwrap();

    let path = dir.path().join("responses").join(format!("{}.json", ResponseCache::key("s", "t", b"")));
    let mode = std::fs::metadata(&path).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o600);
}
