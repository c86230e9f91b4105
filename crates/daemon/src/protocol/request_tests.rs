// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn decodes_call_tool_request() {
    let json = r#"{
        "nonce": "abc123",
        "type": "call_tool",
        "server": "github",
        "tool": "search",
        "args": {"q": "mcp"},
        "cache": 60000000000,
        "verbose": true,
        "cwd": "/home/user/project"
    }"#;

    let request: Request = serde_json::from_str(json).unwrap();
    assert_eq!(request.nonce, "abc123");
    assert_eq!(request.kind, Request::CALL_TOOL);
    assert_eq!(request.server.as_deref(), Some("github"));
    assert_eq!(request.tool.as_deref(), Some("search"));
    assert_eq!(request.cache, Some(60_000_000_000));
    assert!(request.verbose);
    assert_eq!(request.cwd, "/home/user/project");
}

#[test]
fn args_bytes_preserves_raw_json() {
    // Key order and spacing survive, so the cache key is a pure function
    // of the bytes the client sent.
    let json = r#"{"nonce":"n","type":"call_tool","args":{"b":1,  "a":2}}"#;
    let request: Request = serde_json::from_str(json).unwrap();
    assert_eq!(request.args_bytes(), br#"{"b":1,  "a":2}"#);
}

#[test]
fn args_bytes_empty_when_absent() {
    let request = Request::bare("n", Request::PING);
    assert!(request.args_bytes().is_empty());
}

#[test]
fn optional_fields_default() {
    let json = r#"{"nonce":"n","type":"ping"}"#;
    let request: Request = serde_json::from_str(json).unwrap();
    assert!(request.server.is_none());
    assert!(request.tool.is_none());
    assert!(request.cache.is_none());
    assert!(!request.verbose);
    assert_eq!(request.cwd, "");
}

#[test]
fn unknown_type_still_decodes() {
    // The dispatcher, not the decoder, owns the unknown-type error.
    let json = r#"{"nonce":"n","type":"frobnicate"}"#;
    let request: Request = serde_json::from_str(json).unwrap();
    assert_eq!(request.kind, "frobnicate");
}

#[test]
fn round_trips_through_serde() {
    let mut request = Request::bare("nonce", Request::LIST_TOOLS);
    request.server = Some("github".to_string());
    request.verbose = true;
    request.cwd = "/tmp".to_string();

    let encoded = serde_json::to_string(&request).unwrap();
    let decoded: Request = serde_json::from_str(&encoded).unwrap();
    assert_eq!(decoded.kind, Request::LIST_TOOLS);
    assert_eq!(decoded.server.as_deref(), Some("github"));
    assert!(decoded.verbose);
    assert_eq!(decoded.cwd, "/tmp");
}
