// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MCP call-result rendering.
//!
//! Structured content wins outright; otherwise content blocks render in
//! order and join with newlines. Binary payloads (images, blob resources)
//! land in temp files and render as the absolute path, so shell pipelines
//! get something useful instead of base64 soup. A rate-limited sweep reaps
//! old temp files; only files carrying the managed prefix are touched.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use parking_lot::Mutex;
use thiserror::Error;
use tracing::debug;

use crate::pool::{CallOutcome, ContentBlock};
use crate::protocol::ExitCode;

/// Prefix for all managed temp files; the sweep refuses to touch anything
/// else in the directory.
const FILE_PREFIX: &str = "mcpx-";

/// Keep rendered payload files around long enough for the user to consume.
const RETENTION: Duration = Duration::from_secs(24 * 60 * 60);

/// Minimum interval between sweeps.
const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum UnwrapError {
    #[error("decoding binary content: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("writing payload file: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding structured content: {0}")]
    Json(#[from] serde_json::Error),
}

/// Temp-file store for binary tool output.
pub struct TempStore {
    dir: PathBuf,
    last_sweep: Mutex<Option<Instant>>,
}

impl TempStore {
    pub fn new() -> Self {
        Self::in_dir(std::env::temp_dir())
    }

    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), last_sweep: Mutex::new(None) }
    }

    /// Write `bytes` to a fresh temp file named by a MIME-derived
    /// extension; returns the absolute path.
    pub fn write(&self, mime_type: &str, bytes: &[u8]) -> Result<PathBuf, std::io::Error> {
        self.maybe_sweep();

        let file = tempfile::Builder::new()
            .prefix(FILE_PREFIX)
            .suffix(&format!(".{}", extension_for(mime_type)))
            .tempfile_in(&self.dir)?;
        {
            use std::io::Write as _;
            let mut handle = file.as_file();
            handle.write_all(bytes)?;
        }
        let (_, path) = file.keep().map_err(|e| e.error)?;
        Ok(path)
    }

    /// Remove managed files older than the retention threshold. Runs at
    /// most once per [`SWEEP_INTERVAL`].
    fn maybe_sweep(&self) {
        {
            let mut last = self.last_sweep.lock();
            if let Some(at) = *last {
                if at.elapsed() < SWEEP_INTERVAL {
                    return;
                }
            }
            *last = Some(Instant::now());
        }

        let Ok(entries) = std::fs::read_dir(&self.dir) else { return };
        let cutoff = SystemTime::now() - RETENTION;
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(name) = name.to_str() else { continue };
            if !name.starts_with(FILE_PREFIX) {
                continue;
            }
            let stale = entry
                .metadata()
                .and_then(|meta| meta.modified())
                .map(|mtime| mtime < cutoff)
                .unwrap_or(false);
            if stale {
                debug!(file = name, "sweeping stale payload file");
                let _ = std::fs::remove_file(entry.path());
            }
        }
    }
}

impl Default for TempStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Render a call result to response bytes and an exit code.
pub fn unwrap_call_result(
    outcome: &CallOutcome,
    store: &TempStore,
) -> Result<(Vec<u8>, ExitCode), UnwrapError> {
    let exit_code = if outcome.is_error { ExitCode::ToolError } else { ExitCode::Ok };

    if let Some(structured) = &outcome.structured_content {
        let mut bytes = serde_json::to_vec(structured)?;
        ensure_trailing_newline(&mut bytes);
        return Ok((bytes, exit_code));
    }

    let mut rendered = Vec::with_capacity(outcome.content.len());
    for block in &outcome.content {
        rendered.push(render_block(block, store)?);
    }
    let mut bytes = rendered.join("\n").into_bytes();
    ensure_trailing_newline(&mut bytes);
    Ok((bytes, exit_code))
}

fn render_block(block: &ContentBlock, store: &TempStore) -> Result<String, UnwrapError> {
    match block {
        ContentBlock::Text { text } => Ok(text.clone()),
        ContentBlock::Image { data, mime_type } => {
            let bytes = STANDARD.decode(data.as_bytes())?;
            let path = store.write(mime_type, &bytes)?;
            Ok(path.display().to_string())
        }
        ContentBlock::TextResource { text, mime_type } => {
            let mime = mime_type.as_deref().unwrap_or("text/plain");
            let path = store.write(mime, text.as_bytes())?;
            Ok(path.display().to_string())
        }
        ContentBlock::BlobResource { blob, mime_type } => {
            let bytes = STANDARD.decode(blob.as_bytes())?;
            let mime = mime_type.as_deref().unwrap_or("application/octet-stream");
            let path = store.write(mime, &bytes)?;
            Ok(path.display().to_string())
        }
        ContentBlock::Other(value) => Ok(serde_json::to_string(value)?),
    }
}

fn ensure_trailing_newline(bytes: &mut Vec<u8>) {
    if !bytes.is_empty() && bytes.last() != Some(&b'\n') {
        bytes.push(b'\n');
    }
}

fn extension_for(mime_type: &str) -> &'static str {
    match mime_type {
        "image/png" => "png",
        "image/jpeg" => "jpg",
        "image/gif" => "gif",
        "image/webp" => "webp",
        "image/svg+xml" => "svg",
        "text/plain" => "txt",
        "text/html" => "html",
        "text/csv" => "csv",
        "application/json" => "json",
        "application/pdf" => "pdf",
        _ => "bin",
    }
}

/// Path helper used in tests to recognize managed files.
#[cfg(test)]
pub(crate) fn is_managed(path: &Path) -> bool {
    path.file_name()
        .and_then(|name| name.to_str())
        .map(|name| name.starts_with(FILE_PREFIX))
        .unwrap_or(false)
}

#[cfg(test)]
#[path = "unwrap_tests.rs"]
mod tests;
