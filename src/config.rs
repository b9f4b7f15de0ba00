//! Configuration for the middleware and the coroutine runtime.
//!
//! Precedence, lowest to highest: built-in defaults, YAML config file,
//! environment variables, CLI flags (demo binary only).
//!
//! Environment variables:
//! - `TALLY_REPORT_PATH` — path the report page is served from
//! - `TALLY_ID_HEADER` — response header carrying the response id
//! - `TALLY_ID_STRATEGY` — `sequential` or `random`
//! - `TALLY_STACK_SIZE` — coroutine stack size in bytes, decimal or `0x` hex

use std::env;
use std::io;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::ids::IdStrategy;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read { path: PathBuf, source: io::Error },
    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
}

/// Middleware settings.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Path the report page is served from; requests to it are never
    /// measured.
    pub report_path: String,
    /// Response header carrying the response id on measured responses.
    pub id_header: String,
    pub id_strategy: IdStrategy,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            report_path: "/metrics".to_string(),
            id_header: "x-response-id".to_string(),
            id_strategy: IdStrategy::default(),
        }
    }
}

impl MetricsConfig {
    /// Defaults overridden by whatever `TALLY_*` variables are set.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Apply `TALLY_*` environment overrides on top of this config.
    /// Unparseable strategy values are ignored rather than fatal.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("TALLY_REPORT_PATH") {
            self.report_path = v;
        }
        if let Ok(v) = env::var("TALLY_ID_HEADER") {
            self.id_header = v;
        }
        if let Ok(v) = env::var("TALLY_ID_STRATEGY") {
            if let Ok(strategy) = v.parse() {
                self.id_strategy = strategy;
            }
        }
        self
    }
}

/// Coroutine runtime tuning loaded from environment variables.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeConfig {
    /// Stack size for coroutines in bytes (default: 16 KB / 0x4000)
    pub stack_size: usize,
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let stack_size = match env::var("TALLY_STACK_SIZE") {
            Ok(val) => {
                if let Some(hex) = val.strip_prefix("0x") {
                    usize::from_str_radix(hex, 16).unwrap_or(0x4000)
                } else {
                    val.parse().unwrap_or(0x4000)
                }
            }
            Err(_) => 0x4000,
        };
        RuntimeConfig { stack_size }
    }
}
