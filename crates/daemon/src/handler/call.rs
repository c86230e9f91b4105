// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The tool-call path: cache policy, resolution, invocation, storage.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::{Config, ServerConfig};
use crate::pool::{PoolError, SessionError};
use crate::protocol::{ExitCode, Request, Response};

use super::unwrap::unwrap_call_result;
use super::Handler;

pub(super) async fn call_tool(
    handler: &Handler,
    config: &Config,
    request: &Request,
    cancel: CancellationToken,
) -> Response {
    let Some(server) = request.server.as_deref().filter(|s| !s.is_empty()) else {
        return Response::usage("missing server");
    };
    let Some(tool) = request.tool.as_deref().filter(|t| !t.is_empty()) else {
        return Response::usage("missing tool");
    };
    let Some(server_config) = config.servers.get(server) else {
        return Response::usage(format!("unknown server: {server}"));
    };

    handler.keepalive.begin(server).await;
    let response =
        call_with_session(handler, server_config, server, tool, request, cancel).await;
    handler.keepalive.end(server).await;
    response
}

async fn call_with_session(
    handler: &Handler,
    server_config: &ServerConfig,
    server: &str,
    tool: &str,
    request: &Request,
    cancel: CancellationToken,
) -> Response {
    let ttl = match effective_cache_ttl(server_config, tool, request.cache) {
        Ok(ttl) => ttl,
        Err(message) => return Response::internal(message),
    };

    let args = request.args_bytes();
    let mut logs: Vec<String> = Vec::new();

    if ttl.is_some() {
        if let Some((content, exit_code)) = handler.cache.get(server, tool, args) {
            if request.verbose {
                let detail = handler
                    .cache
                    .get_metadata(server, tool, args)
                    .map(|(age, entry_ttl)| {
                        format!(
                            " (age={} ttl={})",
                            humantime::format_duration(truncate_to_secs(age)),
                            humantime::format_duration(truncate_to_secs(entry_ttl)),
                        )
                    })
                    .unwrap_or_default();
                logs.push(format!("mcpx: cache hit{detail}"));
            }
            return Response { content, exit_code, stderr: logs.join("\n") };
        }
        if request.verbose {
            logs.push("mcpx: cache miss".to_string());
        }
    }

    // Resolve canonical tool metadata; the canonical name keys the cache so
    // aliases cache identically.
    let info = tokio::select! {
        result = handler.pool.tool_info_by_name(server, tool) => match result {
            Ok(info) => info,
            Err(e) => {
                let exit_code = classify(&e);
                let message = match e {
                    PoolError::ToolNotFound { .. } => e.to_string(),
                    other => format!("listing tools: {other}"),
                };
                return Response { content: Vec::new(), exit_code, stderr: finish(logs, message) };
            }
        },
        () = cancel.cancelled() => {
            return Response::internal("request cancelled");
        }
    };
    let canonical_tool = if info.name.is_empty() { tool } else { info.name.as_str() };

    let outcome = tokio::select! {
        result = handler.pool.call_tool_with_info(server, &info, args) => match result {
            Ok(outcome) => outcome,
            Err(e) => {
                let exit_code = classify(&e);
                let message = format!("calling tool: {e}");
                return Response { content: Vec::new(), exit_code, stderr: finish(logs, message) };
            }
        },
        () = cancel.cancelled() => {
            return Response::internal("request cancelled");
        }
    };

    let (content, exit_code) = match unwrap_call_result(&outcome, &handler.tmp) {
        Ok(result) => result,
        Err(e) => {
            let message = format!("rendering result: {e}");
            return Response {
                content: Vec::new(),
                exit_code: ExitCode::Internal,
                stderr: finish(logs, message),
            };
        }
    };

    if exit_code == ExitCode::Ok {
        if let Some(ttl) = ttl {
            match handler.cache.put(server, canonical_tool, args, &content, exit_code, ttl) {
                Ok(()) => {
                    if request.verbose {
                        logs.push(format!(
                            "mcpx: cache store (ttl={})",
                            humantime::format_duration(ttl),
                        ));
                    }
                }
                // A broken cache should not fail a successful call.
                Err(e) => warn!(server, tool = canonical_tool, error = %e, "cache write failed"),
            }
        }
    }

    Response { content, exit_code, stderr: logs.join("\n") }
}

/// Resolve the cache TTL for this call, or `None` when caching is off.
///
/// Precedence: per-request override, then the per-tool `cache` boolean,
/// then `no_cache_tools` globs, then the server default TTL. An
/// unparseable default TTL is an internal error (the `Err` string).
pub(super) fn effective_cache_ttl(
    server_config: &ServerConfig,
    tool: &str,
    request_override: Option<i64>,
) -> Result<Option<Duration>, String> {
    if let Some(nanos) = request_override {
        if nanos <= 0 {
            return Ok(None);
        }
        return Ok(Some(Duration::from_nanos(nanos as u64)));
    }

    if server_config.default_cache_ttl.is_empty() {
        return Ok(None);
    }
    let ttl = humantime::parse_duration(&server_config.default_cache_ttl).map_err(|e| {
        format!(
            "parsing default_cache_ttl {:?}: {e}",
            server_config.default_cache_ttl,
        )
    })?;
    if ttl.is_zero() {
        return Ok(None);
    }

    match server_config.tools.get(tool).and_then(|t| t.cache) {
        Some(true) => return Ok(Some(ttl)),
        Some(false) => return Ok(None),
        None => {}
    }

    for pattern in &server_config.no_cache_tools {
        if glob::Pattern::new(pattern).map(|g| g.matches(tool)).unwrap_or(false) {
            return Ok(None);
        }
    }
    Ok(Some(ttl))
}

/// Map pool errors onto the client-visible error taxonomy.
pub(super) fn classify(error: &PoolError) -> ExitCode {
    match error {
        PoolError::UnknownServer(_)
        | PoolError::ToolNotFound { .. }
        | PoolError::InvalidParams(_) => ExitCode::Usage,
        PoolError::EmptyToolInfo => ExitCode::Internal,
        PoolError::Session(SessionError::Rpc { code, message }) => {
            if *code == -32602 || *code == -32601 {
                ExitCode::Usage
            } else if message.contains("invalid params") || message.contains("method not found") {
                ExitCode::Usage
            } else {
                ExitCode::Internal
            }
        }
        PoolError::Session(_) => ExitCode::Internal,
    }
}

fn finish(mut logs: Vec<String>, message: String) -> String {
    logs.push(message);
    logs.join("\n")
}

fn truncate_to_secs(duration: Duration) -> Duration {
    Duration::from_secs(duration.as_secs())
}

#[cfg(test)]
#[path = "call_tests.rs"]
mod tests;
