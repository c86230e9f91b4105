// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request dispatcher with runtime-config synchronization.
//!
//! The handler owns the active working directory, the effective config,
//! and its fingerprint, guarded by a reader-writer lock. Requests from the
//! active cwd dispatch concurrently under the read lock; a cwd change
//! takes the write lock and reloads. Reloads that produce a byte-identical
//! config keep the warm pool — hopping between projects with the same MCP
//! servers does not kill sessions.

mod call;
mod unwrap;

pub use unwrap::{unwrap_call_result, TempStore, UnwrapError};

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::json;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::cache::ResponseCache;
use crate::config::{Config, ConfigLoader};
use crate::keepalive::KeepaliveManager;
use crate::pool::{Pool, PoolError, ToolInfo};
use crate::protocol::{Request, Response};

/// Maximum summary length for non-verbose tool listings.
const SUMMARY_MAX_CHARS: usize = 120;

/// Collaborators the handler cannot construct itself. Tests substitute
/// fakes here instead of mutating process-wide state.
pub struct HandlerDeps {
    pub config_loader: Arc<dyn ConfigLoader>,
    /// Invoked on a `shutdown` request after the response is produced.
    pub request_shutdown: Arc<dyn Fn() + Send + Sync>,
}

struct RuntimeState {
    /// `None` until the first config-needing request arrives.
    active_cwd: Option<String>,
    fingerprint: String,
    config: Arc<Config>,
}

pub struct Handler {
    deps: HandlerDeps,
    pool: Arc<Pool>,
    keepalive: Arc<KeepaliveManager>,
    cache: ResponseCache,
    tmp: TempStore,
    runtime: RwLock<RuntimeState>,
}

impl Handler {
    pub fn new(
        deps: HandlerDeps,
        pool: Arc<Pool>,
        keepalive: Arc<KeepaliveManager>,
        cache: ResponseCache,
        tmp: TempStore,
    ) -> Self {
        Self {
            deps,
            pool,
            keepalive,
            cache,
            tmp,
            runtime: RwLock::new(RuntimeState {
                active_cwd: None,
                fingerprint: String::new(),
                config: Arc::new(Config::default()),
            }),
        }
    }

    /// Handle one request. Always produces a `Response`; failures surface
    /// through `exit_code` and `stderr`, never as transport errors.
    pub async fn handle(&self, request: Request, cancel: CancellationToken) -> Response {
        match request.kind.as_str() {
            Request::PING => Response::ok(Vec::new()),

            Request::SHUTDOWN => {
                info!("shutdown requested");
                (self.deps.request_shutdown)();
                Response::ok(b"shutting down\n".to_vec())
            }

            Request::LIST_SERVERS
            | Request::LIST_TOOLS
            | Request::TOOL_SCHEMA
            | Request::CALL_TOOL => self.with_config(&request, cancel).await,

            other => Response::usage(format!("unknown request type: {other}")),
        }
    }

    /// Acquire the runtime config for the request's cwd and dispatch.
    ///
    /// Same-cwd requests share the read lock and run concurrently; a cwd
    /// change upgrades to the write lock, re-checks (another task may have
    /// advanced it), and reloads.
    async fn with_config(&self, request: &Request, cancel: CancellationToken) -> Response {
        let cwd = request.cwd.trim().to_string();

        {
            let state = self.runtime.read().await;
            if state.active_cwd.as_deref() == Some(cwd.as_str()) {
                let config = Arc::clone(&state.config);
                // Dispatch under the read lock: a reload can never run
                // concurrently with this request.
                return self.dispatch(&config, request, cancel).await;
            }
        }

        let mut state = self.runtime.write().await;
        if state.active_cwd.as_deref() != Some(cwd.as_str()) {
            let config = match self.deps.config_loader.load(&cwd) {
                Ok(config) => config,
                Err(e) => return Response::internal(format!("loading config: {e}")),
            };
            let fingerprint = config.fingerprint();
            if fingerprint != state.fingerprint {
                info!(cwd = %cwd, "config changed, resetting pool");
                self.keepalive.stop().await;
                self.pool.reset(config.clone()).await;
                state.config = Arc::new(config);
                state.fingerprint = fingerprint;
            } else {
                debug!(cwd = %cwd, "config unchanged across cwd change");
            }
            state.active_cwd = Some(cwd);
        }

        let config = Arc::clone(&state.config);
        self.dispatch(&config, request, cancel).await
    }

    async fn dispatch(
        &self,
        config: &Config,
        request: &Request,
        cancel: CancellationToken,
    ) -> Response {
        match request.kind.as_str() {
            Request::LIST_SERVERS => self.list_servers(config),
            Request::LIST_TOOLS => self.list_tools(config, request, cancel).await,
            Request::TOOL_SCHEMA => self.tool_schema(config, request, cancel).await,
            Request::CALL_TOOL => call::call_tool(self, config, request, cancel).await,
            // handle() routes only the four config-needing types here.
            other => Response::usage(format!("unknown request type: {other}")),
        }
    }

    fn list_servers(&self, config: &Config) -> Response {
        // BTreeMap iteration is already lexicographic.
        let mut out = String::new();
        for name in config.servers.keys() {
            out.push_str(name);
            out.push('\n');
        }
        Response::ok(out.into_bytes())
    }

    async fn list_tools(
        &self,
        config: &Config,
        request: &Request,
        cancel: CancellationToken,
    ) -> Response {
        let Some(server) = request.server.as_deref().filter(|s| !s.is_empty()) else {
            return Response::usage("missing server");
        };
        if !config.servers.contains_key(server) {
            return Response::usage(format!("unknown server: {server}"));
        }

        self.keepalive.begin(server).await;
        let result = tokio::select! {
            result = self.pool.list_tools(server) => result,
            () = cancel.cancelled() => Err(PoolError::Session(
                crate::pool::SessionError::Transport("request cancelled".to_string()),
            )),
        };
        self.keepalive.end(server).await;

        let tools = match result {
            Ok(tools) => dedup_tools(tools),
            Err(e) => {
                return Response {
                    content: Vec::new(),
                    exit_code: call::classify(&e),
                    stderr: format!("listing tools: {e}"),
                }
            }
        };

        if request.verbose {
            let entries: Vec<_> = tools
                .iter()
                .map(|info| json!({ "name": info.name, "description": info.description }))
                .collect();
            let mut content = serde_json::to_vec_pretty(&entries).unwrap_or_default();
            content.push(b'\n');
            return Response::ok(content);
        }

        let mut out = String::new();
        for info in &tools {
            out.push_str(&info.name);
            let summary = summarize_description(&info.description);
            if !summary.is_empty() {
                out.push('\t');
                out.push_str(&summary);
            }
            out.push('\n');
        }
        Response::ok(out.into_bytes())
    }

    async fn tool_schema(
        &self,
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
        if !config.servers.contains_key(server) {
            return Response::usage(format!("unknown server: {server}"));
        }

        self.keepalive.begin(server).await;
        let result = tokio::select! {
            result = self.pool.tool_info_by_name(server, tool) => result,
            () = cancel.cancelled() => Err(PoolError::Session(
                crate::pool::SessionError::Transport("request cancelled".to_string()),
            )),
        };
        self.keepalive.end(server).await;

        let info = match result {
            Ok(info) => info,
            Err(e) => {
                let exit_code = call::classify(&e);
                let message = match e {
                    PoolError::ToolNotFound { .. } => e.to_string(),
                    other => format!("listing tools: {other}"),
                };
                return Response { content: Vec::new(), exit_code, stderr: message };
            }
        };

        render_tool_schema(&info)
    }
}

/// Deduplicate by tool name (first listing wins), then sort by name.
fn dedup_tools(tools: Vec<ToolInfo>) -> Vec<ToolInfo> {
    let mut seen = HashSet::new();
    let mut unique: Vec<ToolInfo> =
        tools.into_iter().filter(|info| seen.insert(info.name.clone())).collect();
    unique.sort_by(|a, b| a.name.cmp(&b.name));
    unique
}

/// First non-empty line, internal whitespace collapsed, truncated to 120
/// chars with an ellipsis.
fn summarize_description(description: &str) -> String {
    let line = description.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or("");
    let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= SUMMARY_MAX_CHARS {
        return collapsed;
    }
    let mut truncated: String = collapsed.chars().take(SUMMARY_MAX_CHARS).collect();
    truncated.push_str("...");
    truncated
}

/// Indented JSON with schemas re-embedded as objects, not strings.
fn render_tool_schema(info: &ToolInfo) -> Response {
    let mut doc = serde_json::Map::new();
    doc.insert("name".to_string(), json!(info.name));
    doc.insert("description".to_string(), json!(info.description));
    doc.insert("input_schema".to_string(), parse_schema(&info.input_schema));
    if !info.output_schema.is_empty() {
        doc.insert("output_schema".to_string(), parse_schema(&info.output_schema));
    }

    match serde_json::to_vec_pretty(&doc) {
        Ok(mut content) => {
            content.push(b'\n');
            Response::ok(content)
        }
        Err(e) => Response::internal(format!("encoding schema: {e}")),
    }
}

fn parse_schema(bytes: &[u8]) -> serde_json::Value {
    if bytes.is_empty() {
        return json!({});
    }
    serde_json::from_slice(bytes).unwrap_or(serde_json::Value::Null)
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
