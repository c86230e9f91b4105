// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! One-shot daemon client: one connection, one request, one response.

use thiserror::Error;
use tokio::net::UnixStream;

use mcpx_daemon::lifecycle::Paths;
use mcpx_daemon::protocol::{self, ProtocolError, Request, Response};

use crate::daemon_process::{self, SpawnError};

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon not running")]
    NotRunning,

    #[error(transparent)]
    Spawn(#[from] SpawnError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("{0}")]
    Lifecycle(String),
}

pub struct DaemonClient {
    paths: Paths,
    nonce: String,
}

impl DaemonClient {
    /// Connect to the running daemon, spawning one if necessary.
    pub async fn connect_or_spawn() -> Result<Self, ClientError> {
        let paths = Paths::load().map_err(|e| ClientError::Lifecycle(e.to_string()))?;
        let nonce = daemon_process::spawn_or_connect(&paths).await?;
        Ok(Self { paths, nonce })
    }

    /// Connect only if a daemon is already running.
    pub async fn connect() -> Result<Self, ClientError> {
        let paths = Paths::load().map_err(|e| ClientError::Lifecycle(e.to_string()))?;
        let nonce = std::fs::read_to_string(&paths.state_path)
            .ok()
            .map(|text| text.trim().to_string())
            .filter(|nonce| !nonce.is_empty())
            .ok_or(ClientError::NotRunning)?;
        // Dial eagerly so "not running" surfaces here, not on send.
        UnixStream::connect(&paths.socket_path).await.map_err(|_| ClientError::NotRunning)?;
        Ok(Self { paths, nonce })
    }

    /// Request skeleton carrying the nonce and the client's cwd.
    pub fn request(&self, kind: &str) -> Request {
        let mut request = Request::bare(self.nonce.clone(), kind);
        request.cwd = daemon_process::current_dir_string();
        request
    }

    pub async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        let mut stream = UnixStream::connect(&self.paths.socket_path)
            .await
            .map_err(|_| ClientError::NotRunning)?;
        protocol::write_value(&mut stream, request).await?;
        Ok(protocol::read_value(&mut stream).await?)
    }
}

#[cfg(test)]
#[path = "client_tests.rs"]
mod tests;
