// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;

/// Request from CLI to daemon.
///
/// The request type is a plain string rather than a closed enum so the
/// dispatcher can answer unknown types with a usage error instead of a
/// decode failure. `args` stays as raw JSON: the bytes feed the cache key
/// and are only parsed at the point of dispatch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Request {
    /// Shared secret proving filesystem access to the runtime directory.
    pub nonce: String,

    /// Request type: `ping`, `list_servers`, `list_tools`, `tool_schema`,
    /// `call_tool`, or `shutdown`.
    #[serde(rename = "type")]
    pub kind: String,

    /// Target server name (required for server-scoped requests).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Target tool name (required for `tool_schema` and `call_tool`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    /// Tool arguments as an opaque JSON object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub args: Option<Box<RawValue>>,

    /// Per-request cache TTL override in nanoseconds. Zero or negative
    /// disables caching for this call; absent defers to server config.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<i64>,

    /// Emit diagnostic log lines (cache hit/miss/store) on stderr.
    #[serde(default)]
    pub verbose: bool,

    /// Client working directory; selects the effective config.
    #[serde(default)]
    pub cwd: String,
}

impl Request {
    pub const PING: &'static str = "ping";
    pub const LIST_SERVERS: &'static str = "list_servers";
    pub const LIST_TOOLS: &'static str = "list_tools";
    pub const TOOL_SCHEMA: &'static str = "tool_schema";
    pub const CALL_TOOL: &'static str = "call_tool";
    pub const SHUTDOWN: &'static str = "shutdown";

    /// A bare request of the given type with no server/tool payload.
    pub fn bare(nonce: impl Into<String>, kind: &str) -> Self {
        Self {
            nonce: nonce.into(),
            kind: kind.to_string(),
            server: None,
            tool: None,
            args: None,
            cache: None,
            verbose: false,
            cwd: String::new(),
        }
    }

    /// Raw bytes of the `args` object; empty when absent.
    pub fn args_bytes(&self) -> &[u8] {
        self.args.as_deref().map(|raw| raw.get().as_bytes()).unwrap_or_default()
    }
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
