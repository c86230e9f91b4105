// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;

use super::*;

#[test]
fn parses_a_json_object_argument() {
    let args = vec![r#"{"q": "mcp", "count": 3}"#.to_string()];
    let raw = parse_call_args(&args).unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(raw.get()).unwrap();
    assert_eq!(value["q"], "mcp");
    assert_eq!(value["count"], 3);
}

#[test]
fn parses_key_value_pairs_as_strings() {
    // Values stay strings; the daemon coerces against the input schema.
    let args = vec!["q=mcp".to_string(), "count=3".to_string()];
    let raw = parse_call_args(&args).unwrap().unwrap();
    let value: serde_json::Value = serde_json::from_str(raw.get()).unwrap();
    assert_eq!(value["q"], "mcp");
    assert_eq!(value["count"], "3");
}

#[test]
fn no_arguments_sends_no_args_field() {
    assert!(parse_call_args(&[]).unwrap().is_none());
}

#[test]
fn invalid_json_object_is_a_usage_error() {
    let args = vec![r#"{"unterminated"#.to_string()];
    let err = parse_call_args(&args).unwrap_err();
    assert_eq!(err.code, 2);
}

#[test]
fn bare_word_without_equals_is_a_usage_error() {
    let args = vec!["not-a-pair".to_string()];
    let err = parse_call_args(&args).unwrap_err();
    assert_eq!(err.code, 2);
    assert!(err.message.contains("key=value"), "got: {}", err.message);
}

#[test]
fn render_routes_ok_content_and_exit_code() {
    let response = Response::ok(b"output\n".to_vec());
    assert_eq!(render(&response, false), 0);
}

#[test]
fn render_returns_daemon_exit_codes() {
    let response = Response {
        content: b"partial output\n".to_vec(),
        exit_code: ExitCode::ToolError,
        stderr: "tool failed".to_string(),
    };
    assert_eq!(render(&response, false), 1);
    assert_eq!(render(&response, true), 1);
    assert_eq!(render(&Response::usage("bad"), false), 2);
    assert_eq!(render(&Response::internal("broken"), false), 3);
}

#[test]
fn cli_parses_call_with_cache_flags() {
    let cli = Cli::try_parse_from([
        "mcpx", "call", "github", "search", r#"{"q":"mcp"}"#, "--cache", "90s", "--verbose",
    ])
    .unwrap();
    match cli.command {
        CliCommand::Call { server, tool, args, cache, no_cache, verbose } => {
            assert_eq!(server, "github");
            assert_eq!(tool, "search");
            assert_eq!(args.len(), 1);
            assert_eq!(*cache.unwrap(), std::time::Duration::from_secs(90));
            assert!(!no_cache);
            assert!(verbose);
        }
        _ => panic!("expected call"),
    }
}

#[test]
fn cache_and_no_cache_conflict() {
    let result = Cli::try_parse_from([
        "mcpx", "call", "s", "t", "--cache", "60s", "--no-cache",
    ]);
    assert!(result.is_err());
}

#[test]
fn cli_parses_tools_with_verbose() {
    let cli = Cli::try_parse_from(["mcpx", "tools", "github", "--verbose"]).unwrap();
    match cli.command {
        CliCommand::Tools { server, verbose } => {
            assert_eq!(server, "github");
            assert!(verbose);
        }
        _ => panic!("expected tools"),
    }
}
