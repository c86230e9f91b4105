// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for handling socket I/O.
//!
//! Accepts on the Unix socket and spawns one task per connection. A
//! connection carries exactly one request and one response. Before the
//! handler runs, the peer must pass two checks: the socket peer UID must
//! match ours, and the request nonce must match the daemon's. While the
//! handler runs, the listener watches the client's half of the connection;
//! a closed client cancels the handler, so aborted CLI invocations do not
//! leave orphaned tool calls running.

use std::sync::Arc;

use tokio::io::AsyncReadExt;
use tokio::net::{unix::OwnedReadHalf, UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info};

use crate::handler::Handler;
use crate::protocol::{self, ProtocolError, Request, Response};

/// Shared daemon context for all connections.
pub struct ListenCtx {
    pub nonce: String,
    pub handler: Arc<Handler>,
}

pub struct Listener {
    unix: UnixListener,
    ctx: Arc<ListenCtx>,
}

impl Listener {
    pub fn new(unix: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { unix, ctx }
    }

    /// Accept until `shutdown` fires, then drain in-flight connections.
    pub async fn run(self, shutdown: CancellationToken) {
        let tracker = TaskTracker::new();
        loop {
            tokio::select! {
                () = shutdown.cancelled() => break,
                result = self.unix.accept() => match result {
                    Ok((stream, _addr)) => {
                        let ctx = Arc::clone(&self.ctx);
                        tracker.spawn(async move {
                            if let Err(e) = handle_connection(stream, &ctx).await {
                                log_connection_error(e);
                            }
                        });
                    }
                    Err(e) => error!("accept error: {e}"),
                }
            }
        }

        // Stop accepting, then wait for in-flight handlers.
        drop(self.unix);
        tracker.close();
        tracker.wait().await;
        info!("listener drained");
    }
}

fn log_connection_error(e: ProtocolError) {
    match e {
        ProtocolError::ConnectionClosed => debug!("client disconnected"),
        other => error!("connection error: {other}"),
    }
}

async fn handle_connection(stream: UnixStream, ctx: &ListenCtx) -> Result<(), ProtocolError> {
    // Reject any peer that is not us. SO_PEERCRED / LOCAL_PEERCRED via
    // tokio; platforms without peer credentials fail here rather than
    // serving unauthenticated.
    let cred = stream.peer_cred()?;
    let (mut reader, mut writer) = stream.into_split();
    if cred.uid() != nix::unistd::getuid().as_raw() {
        let response = Response::internal("peer uid mismatch");
        protocol::write_value(&mut writer, &response).await?;
        return Ok(());
    }

    let request: Request = match protocol::read_value(&mut reader).await {
        Ok(request) => request,
        Err(ProtocolError::ConnectionClosed) => return Err(ProtocolError::ConnectionClosed),
        Err(e) => {
            debug!(error = %e, "malformed request");
            let response = Response::internal("invalid request");
            protocol::write_value(&mut writer, &response).await?;
            return Ok(());
        }
    };

    if request.nonce != ctx.nonce {
        let response = Response::internal("nonce mismatch");
        protocol::write_value(&mut writer, &response).await?;
        return Ok(());
    }

    debug!(kind = %request.kind, server = ?request.server, "received request");

    // Race the handler against client disconnect. A client that closes its
    // end aborts the in-flight work.
    let cancel = CancellationToken::new();
    let mut handler_future = std::pin::pin!(ctx.handler.handle(request, cancel.clone()));
    let response = tokio::select! {
        response = &mut handler_future => response,
        () = detect_client_disconnect(&mut reader) => {
            cancel.cancel();
            debug!("client disconnected, cancelling handler");
            // Drive the handler to completion so keepalive refcounts and
            // pool bookkeeping unwind; there is nobody left to answer.
            let _ = handler_future.await;
            return Ok(());
        }
    };

    protocol::write_value(&mut writer, &response).await
}

/// The protocol allows exactly one request per connection, so any read
/// after it — data or EOF — means the client is gone.
async fn detect_client_disconnect(reader: &mut OwnedReadHalf) {
    let mut buf = [0u8; 1];
    let _ = reader.read(&mut buf).await;
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
