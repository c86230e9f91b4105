// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! mcpx — call MCP tools from the command line.
//!
//! Thin client over the background daemon: each invocation sends one
//! request over the Unix socket, prints the result, and exits with the
//! daemon's exit code. The daemon is spawned on demand and keeps tool
//! sessions warm between invocations.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod client;
mod daemon_process;
mod exit_error;

use std::io::Write as _;

use clap::{Parser, Subcommand};
use serde_json::value::RawValue;
use serde_json::Value;

use mcpx_daemon::protocol::{ExitCode, Request, Response};

use crate::client::{ClientError, DaemonClient};
use crate::exit_error::ExitError;

#[derive(Parser)]
#[command(name = "mcpx", version, about = "Fast CLI for MCP tool servers")]
struct Cli {
    /// Suppress tool content on failed calls (diagnostics still print).
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// List configured servers
    Servers,

    /// List a server's tools
    Tools {
        server: String,
        /// Full descriptions as JSON instead of one summary line per tool
        #[arg(short, long)]
        verbose: bool,
    },

    /// Print a tool's schema
    Schema { server: String, tool: String },

    /// Call a tool
    Call {
        server: String,
        tool: String,
        /// Arguments: a single JSON object, or key=value pairs
        args: Vec<String>,
        /// Cache this result for the given duration (e.g. "60s", "5m")
        #[arg(long, conflicts_with = "no_cache")]
        cache: Option<humantime::Duration>,
        /// Bypass the response cache for this call
        #[arg(long)]
        no_cache: bool,
        /// Log cache decisions to stderr
        #[arg(short, long)]
        verbose: bool,
    },

    /// Check that the daemon is responsive (spawns one if needed)
    Ping,

    /// Stop the daemon
    Stop,
}

#[tokio::main]
async fn main() -> std::process::ExitCode {
    let cli = Cli::parse();
    match run(cli.command, cli.quiet).await {
        Ok(code) => std::process::ExitCode::from(code as u8),
        Err(e) => {
            if !e.message.is_empty() {
                eprintln!("mcpx: {e}");
            }
            std::process::ExitCode::from(e.code as u8)
        }
    }
}

async fn run(command: CliCommand, quiet: bool) -> Result<i32, ExitError> {
    if matches!(command, CliCommand::Stop) {
        return stop(quiet).await;
    }

    let client = connect().await?;
    let request = match command {
        CliCommand::Servers => client.request(Request::LIST_SERVERS),
        CliCommand::Tools { server, verbose } => {
            let mut request = client.request(Request::LIST_TOOLS);
            request.server = Some(server);
            request.verbose = verbose;
            request
        }
        CliCommand::Schema { server, tool } => {
            let mut request = client.request(Request::TOOL_SCHEMA);
            request.server = Some(server);
            request.tool = Some(tool);
            request
        }
        CliCommand::Call { server, tool, args, cache, no_cache, verbose } => {
            let mut request = client.request(Request::CALL_TOOL);
            request.server = Some(server);
            request.tool = Some(tool);
            request.args = parse_call_args(&args)?;
            request.cache = if no_cache {
                Some(-1)
            } else {
                cache.map(|d| d.as_nanos().min(i64::MAX as u128) as i64)
            };
            request.verbose = verbose;
            request
        }
        CliCommand::Ping => client.request(Request::PING),
        // Handled above.
        CliCommand::Stop => return stop(quiet).await,
    };
    dispatch(&client, &request, quiet).await
}

async fn connect() -> Result<DaemonClient, ExitError> {
    DaemonClient::connect_or_spawn().await.map_err(|e| ExitError::internal(e.to_string()))
}

async fn dispatch(client: &DaemonClient, request: &Request, quiet: bool) -> Result<i32, ExitError> {
    let response =
        client.send(request).await.map_err(|e| ExitError::internal(e.to_string()))?;
    Ok(render(&response, quiet))
}

/// Route content and diagnostics per the response exit code: OK content to
/// stdout, failing content to stderr (suppressed in quiet mode),
/// diagnostics always to stderr.
fn render(response: &Response, quiet: bool) -> i32 {
    if !response.content.is_empty() {
        if response.exit_code == ExitCode::Ok {
            let mut stdout = std::io::stdout().lock();
            let _ = stdout.write_all(&response.content);
        } else if !quiet {
            let mut stderr_out = std::io::stderr().lock();
            let _ = stderr_out.write_all(&response.content);
        }
    }
    if !response.stderr.is_empty() {
        eprintln!("{}", response.stderr);
    }
    response.exit_code.code()
}

async fn stop(quiet: bool) -> Result<i32, ExitError> {
    let client = match DaemonClient::connect().await {
        Ok(client) => client,
        Err(ClientError::NotRunning) => {
            println!("daemon not running");
            return Ok(0);
        }
        Err(e) => return Err(ExitError::internal(e.to_string())),
    };
    let request = client.request(Request::SHUTDOWN);
    dispatch(&client, &request, quiet).await
}

/// Accept either one JSON object or key=value pairs (values stay strings;
/// the daemon coerces them against the tool's input schema).
fn parse_call_args(args: &[String]) -> Result<Option<Box<RawValue>>, ExitError> {
    if args.is_empty() {
        return Ok(None);
    }

    if args.len() == 1 && args[0].trim_start().starts_with('{') {
        let text = args[0].clone();
        serde_json::from_str::<serde_json::Map<String, Value>>(&text)
            .map_err(|e| ExitError::new(2, format!("invalid JSON arguments: {e}")))?;
        return RawValue::from_string(text)
            .map(Some)
            .map_err(|e| ExitError::new(2, format!("invalid JSON arguments: {e}")));
    }

    let mut object = serde_json::Map::new();
    for pair in args {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(ExitError::new(2, format!("expected key=value argument, got {pair:?}")));
        };
        object.insert(key.to_string(), Value::String(value.to_string()));
    }
    let text = serde_json::to_string(&object)
        .map_err(|e| ExitError::new(2, format!("encoding arguments: {e}")))?;
    RawValue::from_string(text)
        .map(Some)
        .map_err(|e| ExitError::new(2, format!("encoding arguments: {e}")))
}

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;
