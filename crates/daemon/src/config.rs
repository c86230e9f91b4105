// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runtime configuration: MCP server definitions and cache policy.
//!
//! Config is loaded per working-directory epoch: a project file
//! (`.mcpx.toml` or `mcpx.toml`, discovered by walking up from the request
//! cwd) merged over the user-level file (`~/.config/mcpx/config.toml`).
//! Project servers shadow user servers of the same name.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Project-level config file names, tried in order.
const PROJECT_FILES: &[&str] = &[".mcpx.toml", "mcpx.toml"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("server {server}: exactly one of command or url must be set")]
    AmbiguousTransport { server: String },

    #[error("server {server}: invalid glob {pattern:?} in no_cache_tools")]
    BadGlob { server: String, pattern: String },
}

/// Full daemon config: server name to server record. `BTreeMap` keeps
/// serialization canonical so the fingerprint is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub servers: BTreeMap<String, ServerConfig>,
}

/// One configured MCP server. Transport is implied by which fields are
/// populated: stdio servers set `command`, http servers set `url`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Humantime duration string ("60s", "5m"); empty disables caching.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub default_cache_ttl: String,

    /// Glob patterns for tools excluded from caching.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub no_cache_tools: Vec<String>,

    /// Per-tool overrides keyed by tool name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub tools: BTreeMap<String, ToolConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolConfig {
    /// Explicit cache override: `true` re-enables caching with the server
    /// default TTL, `false` disables it, absent defers to server policy.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache: Option<bool>,
}

/// Which transport a server record describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Stdio,
    Http,
}

impl ServerConfig {
    pub fn transport(&self) -> Result<TransportKind, ConfigError> {
        match (&self.command, &self.url) {
            (Some(_), None) => Ok(TransportKind::Stdio),
            (None, Some(_)) => Ok(TransportKind::Http),
            _ => Err(ConfigError::AmbiguousTransport { server: String::new() }),
        }
    }
}

impl Config {
    /// Hex sha256 of the canonical JSON serialization. Two loads that
    /// produce the same effective config fingerprint identically even if
    /// they came from different file paths.
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        // BTreeMap ordering makes this canonical; a Config that serialized
        // once will serialize identically again.
        if let Ok(bytes) = serde_json::to_vec(self) {
            hasher.update(&bytes);
        }
        hex::encode(hasher.finalize())
    }

    /// Validate every server record: exactly one transport, parseable globs.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, server) in &self.servers {
            server
                .transport()
                .map_err(|_| ConfigError::AmbiguousTransport { server: name.clone() })?;
            for pattern in &server.no_cache_tools {
                if glob::Pattern::new(pattern).is_err() {
                    return Err(ConfigError::BadGlob {
                        server: name.clone(),
                        pattern: pattern.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

/// Loads the effective config for a working directory. The handler holds
/// this as an injected dependency; tests substitute fakes.
pub trait ConfigLoader: Send + Sync {
    fn load(&self, cwd: &str) -> Result<Config, ConfigError>;
}

/// Production loader: user-level file merged under the nearest project file.
pub struct FileConfigLoader {
    user_config_path: Option<PathBuf>,
}

impl FileConfigLoader {
    pub fn new() -> Self {
        let user_config_path = std::env::var("MCPX_CONFIG").map(PathBuf::from).ok().or_else(|| {
            dirs::config_dir().map(|dir| dir.join("mcpx").join("config.toml"))
        });
        Self { user_config_path }
    }

    /// Loader rooted at an explicit user config path (tests).
    pub fn with_user_config(path: impl Into<PathBuf>) -> Self {
        Self { user_config_path: Some(path.into()) }
    }
}

impl Default for FileConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader for FileConfigLoader {
    fn load(&self, cwd: &str) -> Result<Config, ConfigError> {
        let mut config = match &self.user_config_path {
            Some(path) if path.exists() => read_config_file(path)?,
            _ => Config::default(),
        };

        if let Some(project_path) = find_project_file(Path::new(cwd.trim())) {
            let project = read_config_file(&project_path)?;
            // Project servers shadow user servers of the same name.
            config.servers.extend(project.servers);
        }

        config.validate()?;
        Ok(config)
    }
}

/// Walk up from `start` looking for a project config file.
fn find_project_file(start: &Path) -> Option<PathBuf> {
    let mut dir = Some(start);
    while let Some(current) = dir {
        for name in PROJECT_FILES {
            let candidate = current.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        dir = current.parent();
    }
    None
}

fn read_config_file(path: &Path) -> Result<Config, ConfigError> {
    let text = std::fs::read_to_string(path)
        .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
    toml::from_str(&text).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
