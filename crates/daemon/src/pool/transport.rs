// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session contract between the pool and the MCP SDK.
//!
//! The pool speaks to servers through [`ToolSession`], created by a
//! [`Connector`]. The production connector is rmcp-backed; tests inject
//! fakes. Keeping rmcp types at this boundary means the dispatcher and
//! result unwrapping never see SDK types.

use std::borrow::Cow;
use std::process::Stdio;

use async_trait::async_trait;
use rmcp::model::{
    CallToolRequestParams, ClientCapabilities, ClientInfo, Implementation, RawContent,
    ResourceContents,
};
use rmcp::service::RunningService;
use rmcp::transport::streamable_http_client::StreamableHttpClientTransportConfig;
use rmcp::transport::{StreamableHttpClientTransport, TokioChildProcess};
use rmcp::{RoleClient, ServiceExt};
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::{ServerConfig, TransportKind};

/// Canonical tool metadata, derived from a server's `tools/list`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
    /// Raw JSON schema bytes; empty when the server supplied none.
    pub input_schema: Vec<u8>,
    /// Raw JSON schema bytes; empty when absent or typeless.
    pub output_schema: Vec<u8>,
}

/// Result of a tool invocation, already lifted out of SDK types.
#[derive(Debug, Clone, Default)]
pub struct CallOutcome {
    /// Tool-level failure flag; transport itself succeeded.
    pub is_error: bool,
    pub structured_content: Option<Value>,
    pub content: Vec<ContentBlock>,
}

#[derive(Debug, Clone)]
pub enum ContentBlock {
    Text { text: String },
    Image { data: String, mime_type: String },
    TextResource { text: String, mime_type: Option<String> },
    BlobResource { blob: String, mime_type: Option<String> },
    /// Content the contract does not model; rendered as raw JSON.
    Other(Value),
}

#[derive(Debug, Error)]
pub enum SessionError {
    /// The server answered with a JSON-RPC error.
    #[error("json-rpc error {code}: {message}")]
    Rpc { code: i32, message: String },

    /// Dial, framing, or stream failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// The MCP `initialize` handshake failed.
    #[error("initializing server {server}: {message}")]
    Initialize { server: String, message: String },
}

/// One initialized MCP session. Callers must serialize access themselves
/// (the pool's per-connection request mutex); implementations assume no
/// interleaved requests.
#[async_trait]
pub trait ToolSession: Send + Sync {
    async fn list_tools(&self) -> Result<Vec<ToolInfo>, SessionError>;

    async fn call_tool(
        &self,
        name: &str,
        args: Map<String, Value>,
    ) -> Result<CallOutcome, SessionError>;

    /// Close the session. Safe to call more than once.
    async fn close(&self);
}

/// Creates sessions from server config. Injected into the pool so tests
/// can substitute fakes.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        server: &str,
        config: &ServerConfig,
    ) -> Result<Box<dyn ToolSession>, SessionError>;
}

/// Production connector backed by the rmcp SDK.
#[derive(Debug, Default)]
pub struct RmcpConnector;

impl RmcpConnector {
    pub fn new() -> Self {
        Self
    }

    fn client_info() -> ClientInfo {
        ClientInfo {
            protocol_version: Default::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: "mcpx".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                ..Default::default()
            },
            meta: Default::default(),
        }
    }
}

#[async_trait]
impl Connector for RmcpConnector {
    async fn connect(
        &self,
        server: &str,
        config: &ServerConfig,
    ) -> Result<Box<dyn ToolSession>, SessionError> {
        let transport_kind = config.transport().map_err(|e| SessionError::Initialize {
            server: server.to_string(),
            message: e.to_string(),
        })?;

        let service = match transport_kind {
            TransportKind::Stdio => {
                let command = config.command.as_deref().unwrap_or_default();
                let mut cmd = tokio::process::Command::new(command);
                cmd.args(&config.args)
                    .envs(&config.env)
                    .stdin(Stdio::piped())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::null());

                let transport = TokioChildProcess::new(cmd).map_err(|e| {
                    SessionError::Initialize {
                        server: server.to_string(),
                        message: format!("spawning {command}: {e}"),
                    }
                })?;
                Self::client_info().serve(transport).await.map_err(|e| {
                    SessionError::Initialize {
                        server: server.to_string(),
                        message: e.to_string(),
                    }
                })?
            }
            TransportKind::Http => {
                let url = config.url.as_deref().unwrap_or_default();
                let client = http_client(config).map_err(|e| SessionError::Initialize {
                    server: server.to_string(),
                    message: e,
                })?;
                let transport = StreamableHttpClientTransport::with_client(
                    client,
                    StreamableHttpClientTransportConfig::with_uri(url.to_string()),
                );
                Self::client_info().serve(transport).await.map_err(|e| {
                    SessionError::Initialize {
                        server: server.to_string(),
                        message: e.to_string(),
                    }
                })?
            }
        };

        debug!(server, "MCP session initialized");
        Ok(Box::new(RmcpSession { service: Mutex::new(Some(service)) }))
    }
}

/// Build a reqwest client carrying the configured headers. No overall
/// request timeout: the SSE response stream is long-lived.
fn http_client(config: &ServerConfig) -> Result<reqwest::Client, String> {
    let mut headers = reqwest::header::HeaderMap::new();
    for (key, value) in &config.headers {
        let name = reqwest::header::HeaderName::from_bytes(key.as_bytes())
            .map_err(|e| format!("invalid header name {key:?}: {e}"))?;
        let val = reqwest::header::HeaderValue::from_str(value)
            .map_err(|e| format!("invalid header value for {key:?}: {e}"))?;
        headers.insert(name, val);
    }
    reqwest::Client::builder()
        .default_headers(headers)
        .connect_timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| format!("building http client: {e}"))
}

struct RmcpSession {
    service: Mutex<Option<RunningService<RoleClient, ClientInfo>>>,
}

#[async_trait]
impl ToolSession for RmcpSession {
    async fn list_tools(&self) -> Result<Vec<ToolInfo>, SessionError> {
        let guard = self.service.lock().await;
        let service = guard
            .as_ref()
            .ok_or_else(|| SessionError::Transport("session closed".to_string()))?;
        let tools = service.list_all_tools().await.map_err(map_service_error)?;
        Ok(tools.iter().map(tool_info_from_rmcp).collect())
    }

    async fn call_tool(
        &self,
        name: &str,
        args: Map<String, Value>,
    ) -> Result<CallOutcome, SessionError> {
        let params = CallToolRequestParams {
            meta: None,
            name: Cow::Owned(name.to_string()),
            arguments: if args.is_empty() { None } else { Some(args) },
            task: None,
        };

        let guard = self.service.lock().await;
        let service = guard
            .as_ref()
            .ok_or_else(|| SessionError::Transport("session closed".to_string()))?;
        let result = service.call_tool(params).await.map_err(map_service_error)?;

        Ok(CallOutcome {
            is_error: result.is_error.unwrap_or(false),
            structured_content: result.structured_content.clone(),
            content: result.content.iter().map(content_block_from_rmcp).collect(),
        })
    }

    async fn close(&self) {
        if let Some(service) = self.service.lock().await.take() {
            if let Err(e) = service.cancel().await {
                warn!(error = %e, "closing MCP session");
            }
        }
    }
}

fn map_service_error(e: rmcp::ServiceError) -> SessionError {
    match e {
        rmcp::ServiceError::McpError(data) => {
            SessionError::Rpc { code: data.code.0, message: data.message.to_string() }
        }
        other => SessionError::Transport(other.to_string()),
    }
}

fn tool_info_from_rmcp(tool: &rmcp::model::Tool) -> ToolInfo {
    let input_schema = serde_json::to_vec(&*tool.input_schema).unwrap_or_default();
    let output_schema = match &tool.output_schema {
        Some(schema) => {
            let has_type = schema
                .get("type")
                .and_then(|v| v.as_str())
                .map(|t| !t.is_empty())
                .unwrap_or(false);
            if has_type {
                serde_json::to_vec(&**schema).unwrap_or_default()
            } else {
                Vec::new()
            }
        }
        None => Vec::new(),
    };

    ToolInfo {
        name: tool.name.to_string(),
        description: tool.description.as_deref().map(str::to_string).unwrap_or_default(),
        input_schema,
        output_schema,
    }
}

fn content_block_from_rmcp(content: &rmcp::model::Content) -> ContentBlock {
    match &**content {
        RawContent::Text(text) => ContentBlock::Text { text: text.text.clone() },
        RawContent::Image(image) => ContentBlock::Image {
            data: image.data.clone(),
            mime_type: image.mime_type.clone(),
        },
        RawContent::Resource(embedded) => match &embedded.resource {
            ResourceContents::TextResourceContents { text, mime_type, .. } => {
                ContentBlock::TextResource { text: text.clone(), mime_type: mime_type.clone() }
            }
            ResourceContents::BlobResourceContents { blob, mime_type, .. } => {
                ContentBlock::BlobResource { blob: blob.clone(), mime_type: mime_type.clone() }
            }
        },
        other => ContentBlock::Other(serde_json::to_value(other).unwrap_or(Value::Null)),
    }
}
