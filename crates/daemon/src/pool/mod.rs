// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MCP connection pool: lazy session creation, per-connection request
//! serialization, error-driven eviction.
//!
//! One connection per server, created on first use. Every RPC holds the
//! connection's request mutex — stdio framing cannot interleave, and HTTP
//! follows the same rule to keep semantics uniform. Any transport error
//! evicts the connection; the next request re-establishes a session.
//!
//! Eviction never blocks the caller: if the connection's request mutex is
//! free the session closes eagerly, otherwise a detached task waits for
//! the in-flight request to finish and closes afterwards. Blocking here
//! would deadlock the pool, since eviction runs with the pool lock held by
//! the calling path.

mod coerce;
mod transport;

pub use coerce::coerce_arguments;
pub use transport::{
    CallOutcome, Connector, ContentBlock, RmcpConnector, SessionError, ToolInfo, ToolSession,
};

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::Config;
use crate::keepalive::SessionCloser;

#[derive(Debug, Error)]
pub enum PoolError {
    #[error("unknown server: {0}")]
    UnknownServer(String),

    // The exact wording is load-bearing: the dispatcher classifies this
    // message as a usage error.
    #[error("tool {tool} not found on server {server}")]
    ToolNotFound { tool: String, server: String },

    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("tool info missing")]
    EmptyToolInfo,

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// A pooled connection: one session plus the request-serialization lock.
struct Connection {
    session: Box<dyn ToolSession>,
    request_lock: Mutex<()>,
    closed: AtomicBool,
}

impl Connection {
    /// Close the underlying session exactly once.
    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.session.close().await;
        }
    }
}

struct PoolState {
    config: Config,
    conns: HashMap<String, Arc<Connection>>,
}

pub struct Pool {
    connector: Arc<dyn Connector>,
    state: Mutex<PoolState>,
}

impl Pool {
    pub fn new(config: Config, connector: Arc<dyn Connector>) -> Self {
        Self { connector, state: Mutex::new(PoolState { config, conns: HashMap::new() }) }
    }

    /// Return the existing connection for `server`, or dial and initialize
    /// one. Construction happens under the pool lock, so concurrent first
    /// requests for the same server produce a single session.
    async fn get_or_create(&self, server: &str) -> Result<Arc<Connection>, PoolError> {
        let mut state = self.state.lock().await;
        if let Some(conn) = state.conns.get(server) {
            return Ok(Arc::clone(conn));
        }

        let config = state
            .config
            .servers
            .get(server)
            .cloned()
            .ok_or_else(|| PoolError::UnknownServer(server.to_string()))?;

        let session = self.connector.connect(server, &config).await?;
        let conn = Arc::new(Connection {
            session,
            request_lock: Mutex::new(()),
            closed: AtomicBool::new(false),
        });
        state.conns.insert(server.to_string(), Arc::clone(&conn));
        debug!(server, "pooled new session");
        Ok(conn)
    }

    /// Fetch the server's tool list. Any transport error evicts the
    /// connection before the error propagates.
    pub async fn list_tools(&self, server: &str) -> Result<Vec<ToolInfo>, PoolError> {
        let conn = self.get_or_create(server).await?;
        let result = {
            let _serialized = conn.request_lock.lock().await;
            conn.session.list_tools().await
        };
        match result {
            Ok(tools) => Ok(tools),
            Err(e) => {
                self.invalidate(server, &conn).await;
                Err(e.into())
            }
        }
    }

    /// Locate a tool by exact name match on the server's tool list.
    pub async fn tool_info_by_name(&self, server: &str, tool: &str) -> Result<ToolInfo, PoolError> {
        let tools = self.list_tools(server).await?;
        tools
            .into_iter()
            .find(|info| info.name == tool)
            .ok_or_else(|| PoolError::ToolNotFound {
                tool: tool.to_string(),
                server: server.to_string(),
            })
    }

    /// Invoke a tool with schema-coerced arguments. `args_json` is the raw
    /// request argument object; empty means no arguments.
    pub async fn call_tool_with_info(
        &self,
        server: &str,
        info: &ToolInfo,
        args_json: &[u8],
    ) -> Result<CallOutcome, PoolError> {
        if info.name.is_empty() {
            return Err(PoolError::EmptyToolInfo);
        }

        let conn = self.get_or_create(server).await?;

        let args: Map<String, Value> = if args_json.is_empty() {
            Map::new()
        } else {
            serde_json::from_slice(args_json)
                .map_err(|e| PoolError::InvalidParams(format!("arguments must be a JSON object: {e}")))?
        };
        let args = coerce_arguments(args, &info.input_schema)
            .map_err(|e| PoolError::InvalidParams(e.to_string()))?;

        let result = {
            let _serialized = conn.request_lock.lock().await;
            conn.session.call_tool(&info.name, args).await
        };
        match result {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                self.invalidate(server, &conn).await;
                Err(e.into())
            }
        }
    }

    /// Remove `conn` from the pool if it is still the current entry for
    /// `server`, then close it without blocking on in-flight requests.
    async fn invalidate(&self, server: &str, conn: &Arc<Connection>) {
        {
            let mut state = self.state.lock().await;
            match state.conns.get(server) {
                Some(current) if Arc::ptr_eq(current, conn) => {
                    state.conns.remove(server);
                }
                // A newer connection replaced this one; nothing to evict.
                _ => return,
            }
        }
        warn!(server, "evicting failed session");
        close_detached(Arc::clone(conn)).await;
    }

    /// Close one server's connection if present.
    pub async fn close(&self, server: &str) {
        let removed = {
            let mut state = self.state.lock().await;
            state.conns.remove(server)
        };
        if let Some(conn) = removed {
            close_detached(conn).await;
        }
    }

    /// Close every connection.
    pub async fn close_all(&self) {
        let conns = {
            let mut state = self.state.lock().await;
            std::mem::take(&mut state.conns)
        };
        for (_, conn) in conns {
            close_detached(conn).await;
        }
    }

    /// Swap in a new config and schedule every existing connection to
    /// close in the background.
    pub async fn reset(&self, new_config: Config) {
        let conns = {
            let mut state = self.state.lock().await;
            state.config = new_config;
            std::mem::take(&mut state.conns)
        };
        for (_, conn) in conns {
            spawn_close(conn);
        }
    }
}

#[async_trait]
impl SessionCloser for Pool {
    async fn close_server(&self, server: &str) {
        self.close(server).await;
    }
}

/// Close eagerly when the request mutex is free; otherwise hand the close
/// to a detached task that waits behind the in-flight request.
async fn close_detached(conn: Arc<Connection>) {
    match conn.request_lock.try_lock() {
        Ok(_serialized) => conn.close().await,
        Err(_) => spawn_close(conn.clone()),
    }
}

fn spawn_close(conn: Arc<Connection>) {
    tokio::spawn(async move {
        let _serialized = conn.request_lock.lock().await;
        conn.close().await;
    });
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
