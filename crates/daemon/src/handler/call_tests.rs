// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use yare::parameterized;

use super::*;
use crate::config::{ServerConfig, ToolConfig};

fn server(default_ttl: &str, no_cache: &[&str]) -> ServerConfig {
    ServerConfig {
        command: Some("srv".to_string()),
        default_cache_ttl: default_ttl.to_string(),
        no_cache_tools: no_cache.iter().map(|s| s.to_string()).collect(),
        ..ServerConfig::default()
    }
}

fn with_tool_override(mut config: ServerConfig, tool: &str, cache: bool) -> ServerConfig {
    config.tools.insert(tool.to_string(), ToolConfig { cache: Some(cache) });
    config
}

#[test]
fn request_override_positive_sets_ttl() {
    let ttl = effective_cache_ttl(&server("", &[]), "t", Some(30_000_000_000)).unwrap();
    assert_eq!(ttl, Some(Duration::from_secs(30)));
}

#[parameterized(
    zero = { 0 },
    negative = { -1 },
)]
fn request_override_nonpositive_disables(nanos: i64) {
    // Even when the server default would cache.
    let ttl = effective_cache_ttl(&server("60s", &[]), "t", Some(nanos)).unwrap();
    assert_eq!(ttl, None);
}

#[test]
fn empty_default_disables_caching() {
    assert_eq!(effective_cache_ttl(&server("", &[]), "t", None).unwrap(), None);
}

#[test]
fn default_ttl_parses_humantime() {
    let ttl = effective_cache_ttl(&server("5m", &[]), "t", None).unwrap();
    assert_eq!(ttl, Some(Duration::from_secs(300)));
}

#[test]
fn zero_default_disables_caching() {
    assert_eq!(effective_cache_ttl(&server("0s", &[]), "t", None).unwrap(), None);
}

#[test]
fn unparseable_default_is_an_error() {
    let err = effective_cache_ttl(&server("sixty seconds-ish", &[]), "t", None).unwrap_err();
    assert!(err.contains("default_cache_ttl"), "got: {err}");
}

#[test]
fn glob_match_disables_caching() {
    let config = server("60s", &["create_*", "delete_*"]);
    assert_eq!(effective_cache_ttl(&config, "create_issue", None).unwrap(), None);
    assert_eq!(
        effective_cache_ttl(&config, "search", None).unwrap(),
        Some(Duration::from_secs(60))
    );
}

#[test]
fn explicit_true_overrides_glob_exclusion() {
    let config = with_tool_override(server("60s", &["search*"]), "search", true);
    assert_eq!(effective_cache_ttl(&config, "search", None).unwrap(), Some(Duration::from_secs(60)));
}

#[test]
fn explicit_false_disables_despite_default() {
    let config = with_tool_override(server("60s", &[]), "search", false);
    assert_eq!(effective_cache_ttl(&config, "search", None).unwrap(), None);
}

#[test]
fn explicit_true_without_default_stays_disabled() {
    // There is no TTL to re-enable with.
    let config = with_tool_override(server("", &[]), "search", true);
    assert_eq!(effective_cache_ttl(&config, "search", None).unwrap(), None);
}

#[test]
fn request_override_beats_everything() {
    let config = with_tool_override(server("60s", &["t"]), "t", false);
    let ttl = effective_cache_ttl(&config, "t", Some(1_000_000_000)).unwrap();
    assert_eq!(ttl, Some(Duration::from_secs(1)));
}

mod classification {
    use super::*;
    use crate::pool::{PoolError, SessionError};
    use crate::protocol::ExitCode;

    #[test]
    fn usage_class_errors() {
        let errors = [
            PoolError::UnknownServer("s".to_string()),
            PoolError::ToolNotFound { tool: "t".to_string(), server: "s".to_string() },
            PoolError::InvalidParams("bad".to_string()),
        ];
        for error in errors {
            assert_eq!(classify(&error), ExitCode::Usage, "{error}");
        }
    }

    #[parameterized(
        invalid_params_code = { -32602, "something went wrong" },
        method_not_found_code = { -32601, "something went wrong" },
    )]
    fn rpc_usage_codes(code: i32, message: &str) {
        let error = PoolError::Session(SessionError::Rpc { code, message: message.to_string() });
        assert_eq!(classify(&error), ExitCode::Usage);
    }

    #[parameterized(
        invalid_params_text = { "invalid params: missing field" },
        method_not_found_text = { "method not found" },
    )]
    fn rpc_usage_text_matches(message: &str) {
        let error = PoolError::Session(SessionError::Rpc { code: 0, message: message.to_string() });
        assert_eq!(classify(&error), ExitCode::Usage);
    }

    #[test]
    fn other_rpc_codes_are_internal() {
        let error = PoolError::Session(SessionError::Rpc {
            code: -32600,
            message: "invalid request".to_string(),
        });
        assert_eq!(classify(&error), ExitCode::Internal);
    }

    #[test]
    fn transport_errors_are_internal() {
        let error =
            PoolError::Session(SessionError::Transport("connection reset".to_string()));
        assert_eq!(classify(&error), ExitCode::Internal);
    }

    #[test]
    fn initialize_errors_are_internal() {
        let error = PoolError::Session(SessionError::Initialize {
            server: "s".to_string(),
            message: "refused".to_string(),
        });
        assert_eq!(classify(&error), ExitCode::Internal);
    }

    #[test]
    fn empty_tool_info_is_internal() {
        assert_eq!(classify(&PoolError::EmptyToolInfo), ExitCode::Internal);
    }
}
