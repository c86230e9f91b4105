// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Unframed JSON wire helpers.
//!
//! Each side writes exactly one JSON value. The reader accumulates bytes
//! until the buffer parses as a complete value, so neither side needs to
//! close its write half to delimit a message — which matters because the
//! daemon watches the client's half of the connection for disconnect.

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Upper bound on a single request or response frame.
pub const MAX_FRAME_BYTES: usize = 32 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("connection closed")]
    ConnectionClosed,

    #[error("frame exceeds {MAX_FRAME_BYTES} bytes")]
    TooLarge,

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Read one JSON value from the stream.
///
/// Returns as soon as the accumulated bytes form a complete value; trailing
/// bytes (there should be none) are ignored.
pub async fn read_value<R, T>(reader: &mut R) -> Result<T, ProtocolError>
where
    R: AsyncRead + Unpin,
    T: DeserializeOwned,
{
    let mut buf: Vec<u8> = Vec::with_capacity(1024);
    loop {
        let n = reader.read_buf(&mut buf).await?;
        if buf.len() > MAX_FRAME_BYTES {
            return Err(ProtocolError::TooLarge);
        }

        let mut stream = serde_json::Deserializer::from_slice(&buf).into_iter::<T>();
        match stream.next() {
            Some(Ok(value)) => return Ok(value),
            Some(Err(e)) if e.is_eof() => {
                if n == 0 {
                    return Err(ProtocolError::ConnectionClosed);
                }
            }
            Some(Err(e)) => return Err(ProtocolError::Json(e)),
            None => {
                if n == 0 {
                    return Err(ProtocolError::ConnectionClosed);
                }
            }
        }
    }
}

/// Write one JSON value to the stream and flush.
pub async fn write_value<W, T>(writer: &mut W, value: &T) -> Result<(), ProtocolError>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let bytes = serde_json::to_vec(value)?;
    writer.write_all(&bytes).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
