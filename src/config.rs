// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Runtime configuration from environment variables and an optional file.
//!
//! Values come from `VOX_*` environment variables, layered over an
//! optional TOML file named by `VOX_CONFIG`. Invalid environment values
//! fall back to defaults without crashing; an unreadable or malformed
//! config file is an error.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `VOX_CONFIG` | unset | TOML file with the same keys in lowercase |
//! | `VOX_DEVICES` | unset | Explicit device list, e.g. `0,1,3`; order is kept and the first entry runs inline tasks |
//! | `VOX_FALLBACK_DEVICES` | `0,1` | Pool used when probing finds nothing |
//! | `VOX_POLL_TIMEOUT_MS` | 2000 | Worker queue poll timeout (floor 10) |
//! | `VOX_SHUTDOWN_TIMEOUT` | 30 | Graceful shutdown timeout (secs) |
//! | `VOX_LIST_LIMIT` | 50 | Max records returned by a listing |
//! | `VOX_ADAPTER_DIR` | `lora` | Adapter catalog root |
//! | `VOX_OUTPUT_DIR` | `api_outputs` | Artifact directory |
//! | `VOX_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `VOX_LOG_LEVEL` | `info` | Log filter directive |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resources::{parse_device_list, ResourceId};
use crate::telemetry::{LogConfig, LogFormat};

const DEFAULT_FALLBACK_DEVICES: &str = "0,1";
const DEFAULT_POLL_TIMEOUT_MS: u64 = 2000;
const MIN_POLL_TIMEOUT_MS: u64 = 10;
const DEFAULT_SHUTDOWN_SECS: u64 = 30;
const DEFAULT_LIST_LIMIT: usize = 50;
const DEFAULT_ADAPTER_DIR: &str = "lora";
const DEFAULT_OUTPUT_DIR: &str = "api_outputs";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Optional file layer. Every key may be omitted.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FileConfig {
    pub devices: Option<String>,
    pub fallback_devices: Option<String>,
    pub poll_timeout_ms: Option<u64>,
    pub shutdown_timeout: Option<u64>,
    pub list_limit: Option<usize>,
    pub adapter_dir: Option<PathBuf>,
    pub output_dir: Option<PathBuf>,
    pub log_format: Option<String>,
    pub log_level: Option<String>,
}

impl FileConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn parse(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }
}

/// Effective configuration summary (serializable).
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub config_file: Option<PathBuf>,
    pub devices: Option<String>,
    pub fallback_devices: Vec<ResourceId>,
    pub poll_timeout_ms: u64,
    pub shutdown_timeout_secs: u64,
    pub list_limit: usize,
    pub adapter_dir: PathBuf,
    pub output_dir: PathBuf,
    pub log_format: LogFormat,
    pub log_level: String,
}

/// All runtime configuration.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub config_file: Option<PathBuf>,
    /// Explicit device list; `None` means probe the platform.
    pub devices: Option<String>,
    pub fallback_devices: Vec<ResourceId>,
    pub poll_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub list_limit: usize,
    pub adapter_dir: PathBuf,
    pub output_dir: PathBuf,
    pub log: LogConfig,
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Parse a `u64` from env, then the file, then `default`.
fn parse_u64(key: &str, file: Option<u64>, default: u64) -> u64 {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<u64>().unwrap_or(default),
        Err(_) => file.unwrap_or(default),
    }
}

/// Parse a `usize` from env, then the file, then `default`.
fn parse_usize(key: &str, file: Option<usize>, default: usize) -> usize {
    match std::env::var(key) {
        Ok(val) => val.trim().parse::<usize>().unwrap_or(default),
        Err(_) => file.unwrap_or(default),
    }
}

fn load_fallback_devices(file: &FileConfig) -> Vec<ResourceId> {
    let raw = env_string("VOX_FALLBACK_DEVICES")
        .or_else(|| file.fallback_devices.clone())
        .unwrap_or_else(|| DEFAULT_FALLBACK_DEVICES.to_string());
    match parse_device_list(&raw) {
        Ok(ids) => ids,
        Err(e) => {
            tracing::warn!(value = %raw, error = %e, "invalid fallback device list, using default");
            parse_device_list(DEFAULT_FALLBACK_DEVICES).unwrap_or_default()
        }
    }
}

fn load_log_config(file: &FileConfig) -> LogConfig {
    let format = env_string("VOX_LOG_FORMAT")
        .or_else(|| file.log_format.clone())
        .and_then(|raw| raw.parse::<LogFormat>().ok())
        .unwrap_or_default();
    let level = env_string("VOX_LOG_LEVEL")
        .or_else(|| file.log_level.clone())
        .unwrap_or_else(|| "info".to_string());
    LogConfig {
        format,
        level,
        output_path: None,
    }
}

/// Build the configuration from an already-read file layer.
pub fn from_layers(config_file: Option<PathBuf>, file: FileConfig) -> EnvConfig {
    let poll_ms = parse_u64("VOX_POLL_TIMEOUT_MS", file.poll_timeout_ms, DEFAULT_POLL_TIMEOUT_MS);
    let poll_ms = poll_ms.max(MIN_POLL_TIMEOUT_MS);
    let shutdown_secs = parse_u64("VOX_SHUTDOWN_TIMEOUT", file.shutdown_timeout, DEFAULT_SHUTDOWN_SECS);
    let shutdown_secs = shutdown_secs.max(1);
    let list_limit = parse_usize("VOX_LIST_LIMIT", file.list_limit, DEFAULT_LIST_LIMIT);
    let list_limit = list_limit.max(1);

    let adapter_dir = env_string("VOX_ADAPTER_DIR")
        .map(PathBuf::from)
        .or_else(|| file.adapter_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_ADAPTER_DIR));
    let output_dir = env_string("VOX_OUTPUT_DIR")
        .map(PathBuf::from)
        .or_else(|| file.output_dir.clone())
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    EnvConfig {
        config_file,
        devices: env_string("VOX_DEVICES").or_else(|| file.devices.clone()),
        fallback_devices: load_fallback_devices(&file),
        poll_timeout: Duration::from_millis(poll_ms),
        shutdown_timeout: Duration::from_secs(shutdown_secs),
        list_limit,
        adapter_dir,
        output_dir,
        log: load_log_config(&file),
    }
}

/// Load configuration from `VOX_CONFIG` (if set) and the environment.
pub fn load() -> Result<EnvConfig, ConfigError> {
    let config_file = env_string("VOX_CONFIG").map(PathBuf::from);
    let file = match &config_file {
        Some(path) => FileConfig::from_path(path)?,
        None => FileConfig::default(),
    };
    Ok(from_layers(config_file, file))
}

impl EnvConfig {
    /// Serializable summary of all effective values.
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            config_file: self.config_file.clone(),
            devices: self.devices.clone(),
            fallback_devices: self.fallback_devices.clone(),
            poll_timeout_ms: self.poll_timeout.as_millis() as u64,
            shutdown_timeout_secs: self.shutdown_timeout.as_secs(),
            list_limit: self.list_limit,
            adapter_dir: self.adapter_dir.clone(),
            output_dir: self.output_dir.clone(),
            log_format: self.log.format,
            log_level: self.log.level.clone(),
        }
    }

    /// Runtime knobs derived from this configuration.
    pub fn runtime_config(&self) -> crate::RuntimeConfig {
        crate::RuntimeConfig {
            poll_timeout: self.poll_timeout,
            shutdown_timeout: self.shutdown_timeout,
            list_limit: self.list_limit,
        }
    }
}

/// Serializes unit tests that mutate `VOX_*` variables.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
