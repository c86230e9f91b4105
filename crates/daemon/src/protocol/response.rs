// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde::{Deserialize, Serialize};

/// Outcome of a request, doubling as the CLI process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum ExitCode {
    /// Request handled, tool (if any) succeeded.
    Ok,
    /// Transport succeeded but the tool flagged its result as an error.
    ToolError,
    /// The client asked for something that does not exist or is malformed.
    Usage,
    /// Daemon-side failure: config, transport, encoding, auth.
    Internal,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        u8::from(self) as i32
    }
}

impl From<ExitCode> for u8 {
    fn from(code: ExitCode) -> Self {
        match code {
            ExitCode::Ok => 0,
            ExitCode::ToolError => 1,
            ExitCode::Usage => 2,
            ExitCode::Internal => 3,
        }
    }
}

impl TryFrom<u8> for ExitCode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(ExitCode::Ok),
            1 => Ok(ExitCode::ToolError),
            2 => Ok(ExitCode::Usage),
            3 => Ok(ExitCode::Internal),
            other => Err(format!("unknown exit code {other}")),
        }
    }
}

/// Response from daemon to CLI. Exactly one per connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Tool or listing output. Base64 on the wire.
    #[serde(with = "content_bytes", default, skip_serializing_if = "Vec::is_empty")]
    pub content: Vec<u8>,

    pub exit_code: ExitCode,

    /// Human-readable diagnostics; the CLI prints this to its stderr.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub stderr: String,
}

impl Response {
    pub fn ok(content: impl Into<Vec<u8>>) -> Self {
        Self { content: content.into(), exit_code: ExitCode::Ok, stderr: String::new() }
    }

    pub fn usage(message: impl Into<String>) -> Self {
        Self { content: Vec::new(), exit_code: ExitCode::Usage, stderr: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self { content: Vec::new(), exit_code: ExitCode::Internal, stderr: message.into() }
    }
}

/// Base64 (standard alphabet) encoding for byte fields on the wire and in
/// cache entries.
pub(crate) mod content_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
