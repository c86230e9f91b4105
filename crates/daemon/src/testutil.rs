// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fakes for daemon tests: an in-memory MCP connector/session and a
//! counting config loader.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};

use crate::config::{Config, ConfigError, ConfigLoader, ServerConfig};
use crate::pool::{CallOutcome, Connector, ContentBlock, SessionError, ToolInfo, ToolSession};

/// A stdio server record pointing at a command that never runs (fakes
/// intercept before any spawn).
pub fn stdio_server() -> ServerConfig {
    ServerConfig { command: Some("fake-mcp-server".to_string()), ..ServerConfig::default() }
}

pub fn config_with_servers(names: &[&str]) -> Config {
    let mut config = Config::default();
    for name in names {
        config.servers.insert((*name).to_string(), stdio_server());
    }
    config
}

pub fn text_outcome(text: &str) -> CallOutcome {
    CallOutcome {
        is_error: false,
        structured_content: None,
        content: vec![ContentBlock::Text { text: text.to_string() }],
    }
}

/// Scripted session: fixed tool list, per-call results, and counters for
/// every observable interaction.
pub struct FakeSession {
    pub tools: Mutex<Vec<ToolInfo>>,
    pub call_results: Mutex<Vec<Result<CallOutcome, SessionError>>>,
    pub list_error: Mutex<Option<SessionError>>,
    pub list_calls: AtomicUsize,
    pub tool_calls: AtomicUsize,
    pub close_calls: AtomicUsize,
    /// Currently executing RPCs; used to observe (lack of) interleaving.
    pub active: AtomicUsize,
    pub max_active: AtomicUsize,
    /// How long each RPC pretends to take.
    pub latency: Duration,
    /// Arguments seen by `call_tool`, in order.
    pub seen_args: Mutex<Vec<Map<String, Value>>>,
}

impl FakeSession {
    pub fn new(tools: Vec<ToolInfo>) -> Self {
        Self {
            tools: Mutex::new(tools),
            call_results: Mutex::new(Vec::new()),
            list_error: Mutex::new(None),
            list_calls: AtomicUsize::new(0),
            tool_calls: AtomicUsize::new(0),
            close_calls: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            max_active: AtomicUsize::new(0),
            latency: Duration::ZERO,
            seen_args: Mutex::new(Vec::new()),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn push_call_result(&self, result: Result<CallOutcome, SessionError>) {
        self.call_results.lock().push(result);
    }

    async fn track<T>(&self, work: impl std::future::Future<Output = T>) -> T {
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        let result = work.await;
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl ToolSession for FakeSession {
    async fn list_tools(&self) -> Result<Vec<ToolInfo>, SessionError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let latency = self.latency;
        self.track(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
        })
        .await;
        if let Some(error) = self.list_error.lock().take() {
            return Err(error);
        }
        Ok(self.tools.lock().clone())
    }

    async fn call_tool(
        &self,
        _name: &str,
        args: Map<String, Value>,
    ) -> Result<CallOutcome, SessionError> {
        self.tool_calls.fetch_add(1, Ordering::SeqCst);
        self.seen_args.lock().push(args);
        let latency = self.latency;
        self.track(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
        })
        .await;
        let next = {
            let mut results = self.call_results.lock();
            if results.is_empty() {
                None
            } else {
                Some(results.remove(0))
            }
        };
        next.unwrap_or_else(|| Ok(text_outcome("ok")))
    }

    async fn close(&self) {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
    }
}

/// Connector handing out pre-registered sessions per server, counting
/// connects. Repeated connects for a server reuse the same `FakeSession`
/// so tests can assert on its counters across evictions.
pub struct FakeConnector {
    pub sessions: Mutex<HashMap<String, Arc<FakeSession>>>,
    pub connects: AtomicUsize,
    pub connect_error: Mutex<Option<String>>,
}

impl FakeConnector {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            connects: AtomicUsize::new(0),
            connect_error: Mutex::new(None),
        }
    }

    pub fn register(&self, server: &str, session: Arc<FakeSession>) {
        self.sessions.lock().insert(server.to_string(), session);
    }

    pub fn session(&self, server: &str) -> Arc<FakeSession> {
        Arc::clone(&self.sessions.lock()[server])
    }
}

/// Shares the registered `FakeSession` so counters survive reconnects.
struct SharedSession(Arc<FakeSession>);

#[async_trait]
impl ToolSession for SharedSession {
    async fn list_tools(&self) -> Result<Vec<ToolInfo>, SessionError> {
        self.0.list_tools().await
    }

    async fn call_tool(
        &self,
        name: &str,
        args: Map<String, Value>,
    ) -> Result<CallOutcome, SessionError> {
        self.0.call_tool(name, args).await
    }

    async fn close(&self) {
        self.0.close().await;
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(
        &self,
        server: &str,
        _config: &ServerConfig,
    ) -> Result<Box<dyn ToolSession>, SessionError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = self.connect_error.lock().take() {
            return Err(SessionError::Initialize { server: server.to_string(), message });
        }
        let session = self
            .sessions
            .lock()
            .get(server)
            .map(Arc::clone)
            .unwrap_or_else(|| Arc::new(FakeSession::new(Vec::new())));
        Ok(Box::new(SharedSession(session)))
    }
}

/// Config loader returning a fixed per-cwd config, counting loads.
pub struct FakeLoader {
    pub configs: Mutex<HashMap<String, Config>>,
    pub fallback: Config,
    pub loads: AtomicUsize,
}

impl FakeLoader {
    pub fn returning(fallback: Config) -> Self {
        Self { configs: Mutex::new(HashMap::new()), fallback, loads: AtomicUsize::new(0) }
    }

    pub fn set_config(&self, cwd: &str, config: Config) {
        self.configs.lock().insert(cwd.to_string(), config);
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ConfigLoader for FakeLoader {
    fn load(&self, cwd: &str) -> Result<Config, ConfigError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(self.configs.lock().get(cwd).cloned().unwrap_or_else(|| self.fallback.clone()))
    }
}

pub fn tool(name: &str, description: &str) -> ToolInfo {
    ToolInfo {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: br#"{"type":"object"}"#.to_vec(),
        output_schema: Vec::new(),
    }
}
