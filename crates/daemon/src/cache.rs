// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content-addressed response cache with per-entry TTL.
//!
//! Entries live under `<cache_dir>/responses/<key>.json` where the key is
//! the first 32 hex chars of `sha256(server \0 tool \0 args_bytes)`. 128
//! bits of prefix make truncated collisions a non-concern. Expired or
//! malformed entries are deleted on read; there is no other eviction.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::debug;

use crate::protocol::response::content_bytes;
use crate::protocol::ExitCode;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("writing cache entry: {0}")]
    Io(#[from] std::io::Error),

    #[error("encoding cache entry: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, Serialize, Deserialize)]
struct CacheEntry {
    #[serde(with = "content_bytes", default)]
    content: Vec<u8>,
    exit_code: ExitCode,
    #[serde(default = "epoch")]
    created: DateTime<Utc>,
    expires: DateTime<Utc>,
}

fn epoch() -> DateTime<Utc> {
    Utc.timestamp_opt(0, 0).single().unwrap_or_default()
}

/// On-disk response cache. Cheap to clone paths around; all state is the
/// filesystem, which tolerates races (last writer wins, expired unlink is
/// idempotent).
#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    /// Cache rooted at `<cache_dir>/responses`.
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self { dir: cache_dir.into().join("responses") }
    }

    /// Cache key: first 32 hex chars of sha256 over the NUL-joined triple.
    pub fn key(server: &str, tool: &str, args: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(server.as_bytes());
        hasher.update([0u8]);
        hasher.update(tool.as_bytes());
        hasher.update([0u8]);
        hasher.update(args);
        let digest = hex::encode(hasher.finalize());
        digest[..32].to_string()
    }

    fn entry_path(&self, server: &str, tool: &str, args: &[u8]) -> PathBuf {
        self.dir.join(format!("{}.json", Self::key(server, tool, args)))
    }

    /// Look up a cached response. Expired and undecodable entries are
    /// deleted and count as a miss.
    pub fn get(&self, server: &str, tool: &str, args: &[u8]) -> Option<(Vec<u8>, ExitCode)> {
        let path = self.entry_path(server, tool, args);
        let entry = read_entry(&path)?;
        if Utc::now() > entry.expires {
            let _ = std::fs::remove_file(&path);
            return None;
        }
        Some((entry.content, entry.exit_code))
    }

    /// Age and TTL of a cached entry, for verbose diagnostics. Entries
    /// written before `created` existed fall back to the file mtime, then
    /// to `expires`.
    pub fn get_metadata(
        &self,
        server: &str,
        tool: &str,
        args: &[u8],
    ) -> Option<(Duration, Duration)> {
        let path = self.entry_path(server, tool, args);
        let entry = read_entry(&path)?;

        let created = if entry.created == epoch() {
            std::fs::metadata(&path)
                .and_then(|meta| meta.modified())
                .ok()
                .map(DateTime::<Utc>::from)
                .unwrap_or(entry.expires)
        } else {
            entry.created
        };

        let age = (Utc::now() - created).to_std().unwrap_or_default();
        let ttl = (entry.expires - created).to_std().unwrap_or_default();
        Some((age, ttl))
    }

    /// Store a response with the given TTL. Written atomically (temp file
    /// plus rename) with mode 0600.
    pub fn put(
        &self,
        server: &str,
        tool: &str,
        args: &[u8],
        content: &[u8],
        exit_code: ExitCode,
        ttl: Duration,
    ) -> Result<(), CacheError> {
        std::fs::create_dir_all(&self.dir)?;

        let now = Utc::now();
        let entry = CacheEntry {
            content: content.to_vec(),
            exit_code,
            created: now,
            expires: now + chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero()),
        };
        let bytes = serde_json::to_vec(&entry)?;

        let path = self.entry_path(server, tool, args);
        let tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        {
            use std::io::Write as _;
            let mut file = tmp.as_file();
            file.write_all(&bytes)?;
        }
        set_private_mode(tmp.path())?;
        tmp.persist(&path).map_err(|e| CacheError::Io(e.error))?;

        debug!(key = %Self::key(server, tool, args), ttl = ?ttl, "cached response");
        Ok(())
    }
}

fn read_entry(path: &Path) -> Option<CacheEntry> {
    let bytes = std::fs::read(path).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(entry) => Some(entry),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "dropping malformed cache entry");
            let _ = std::fs::remove_file(path);
            None
        }
    }
}

#[cfg(unix)]
fn set_private_mode(path: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
