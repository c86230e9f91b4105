// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! IPC protocol for daemon communication.
//!
//! Wire format: one UTF-8 JSON value per direction per connection, no
//! framing header. The client writes a [`Request`], keeps its end open,
//! and reads a single [`Response`]; the daemon closes the connection
//! after writing.

mod request;
pub(crate) mod response;
mod wire;

pub use request::Request;
pub use response::{ExitCode, Response};
pub use wire::{read_value, write_value, ProtocolError, MAX_FRAME_BYTES};
