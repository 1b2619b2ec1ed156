// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Adapter catalog: which configurations exist and how to load them.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;

use super::settings::{AdapterSettings, CheckpointInfo, ConfigKey};

/// Weights file that marks a directory as an adapter checkpoint.
pub const WEIGHTS_FILE: &str = "lora_weights.safetensors";
/// Optional per-checkpoint settings file.
pub const SETTINGS_FILE: &str = "lora_config.json";

#[derive(Error, Debug)]
pub enum CatalogError {
    #[error("Adapter not found: {0}")]
    NotFound(ConfigKey),

    #[error("Adapter key not allowed: {0}")]
    InvalidKey(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the engine needs to bind one configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigurationDescriptor {
    pub key: ConfigKey,
    /// Adapter checkpoint directory; `None` for the base model.
    pub adapter_dir: Option<PathBuf>,
    /// Base model recorded by the checkpoint, if any.
    pub base_model: Option<String>,
    pub settings: AdapterSettings,
}

impl ConfigurationDescriptor {
    pub fn base() -> Self {
        Self {
            key: ConfigKey::base(),
            adapter_dir: None,
            base_model: None,
            settings: AdapterSettings::default(),
        }
    }
}

/// Lookup of known configurations.
///
/// The base key always exists.
#[async_trait]
pub trait ConfigurationCatalog: Send + Sync {
    async fn exists(&self, key: &ConfigKey) -> bool;

    async fn resolve(&self, key: &ConfigKey) -> Result<ConfigurationDescriptor, CatalogError>;

    /// Known adapter keys, newest checkpoint names first.
    async fn list(&self) -> Result<Vec<ConfigKey>, CatalogError>;
}

/// In-memory catalog, for embedding and tests.
#[derive(Debug, Default)]
pub struct StaticCatalog {
    entries: BTreeMap<ConfigKey, ConfigurationDescriptor>,
}

impl StaticCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an adapter with default settings.
    pub fn with_adapter(mut self, key: impl Into<String>) -> Self {
        let key = ConfigKey::new(key);
        let descriptor = ConfigurationDescriptor {
            key: key.clone(),
            adapter_dir: Some(PathBuf::from(key.as_str())),
            base_model: None,
            settings: AdapterSettings::default(),
        };
        self.entries.insert(key, descriptor);
        self
    }

    pub fn insert(&mut self, descriptor: ConfigurationDescriptor) {
        self.entries.insert(descriptor.key.clone(), descriptor);
    }
}

#[async_trait]
impl ConfigurationCatalog for StaticCatalog {
    async fn exists(&self, key: &ConfigKey) -> bool {
        key.is_base() || self.entries.contains_key(key)
    }

    async fn resolve(&self, key: &ConfigKey) -> Result<ConfigurationDescriptor, CatalogError> {
        if key.is_base() {
            return Ok(ConfigurationDescriptor::base());
        }
        self.entries
            .get(key)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(key.clone()))
    }

    async fn list(&self) -> Result<Vec<ConfigKey>, CatalogError> {
        Ok(self.entries.keys().rev().cloned().collect())
    }
}

/// Catalog backed by a directory tree of adapter checkpoints.
///
/// A key is the `/`-separated path of a checkpoint directory relative to
/// the root, e.g. `speaker_a/step_2000`.
pub struct DirectoryCatalog {
    root: PathBuf,
}

impl DirectoryCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a key to a directory inside the root, rejecting traversal.
    fn checkpoint_dir(&self, key: &ConfigKey) -> Result<PathBuf, CatalogError> {
        let relative = Path::new(key.as_str());
        let is_plain = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !is_plain {
            return Err(CatalogError::InvalidKey(key.to_string()));
        }
        Ok(self.root.join(relative))
    }

    async fn read_checkpoint_info(dir: &Path) -> CheckpointInfo {
        let path = dir.join(SETTINGS_FILE);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(_) => return CheckpointInfo::default(),
        };
        match serde_json::from_str(&raw) {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unreadable adapter settings");
                CheckpointInfo::default()
            }
        }
    }
}

fn key_for(relative: &Path) -> ConfigKey {
    let joined = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/");
    ConfigKey::new(joined)
}

#[async_trait]
impl ConfigurationCatalog for DirectoryCatalog {
    async fn exists(&self, key: &ConfigKey) -> bool {
        if key.is_base() {
            return true;
        }
        match self.checkpoint_dir(key) {
            Ok(dir) => tokio::fs::try_exists(dir.join(WEIGHTS_FILE))
                .await
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    async fn resolve(&self, key: &ConfigKey) -> Result<ConfigurationDescriptor, CatalogError> {
        if key.is_base() {
            return Ok(ConfigurationDescriptor::base());
        }
        let dir = self.checkpoint_dir(key)?;
        if !self.exists(key).await {
            return Err(CatalogError::NotFound(key.clone()));
        }

        let info = Self::read_checkpoint_info(&dir).await;
        Ok(ConfigurationDescriptor {
            key: key.clone(),
            adapter_dir: Some(dir),
            base_model: info.base_model,
            settings: info.lora_config.unwrap_or_default(),
        })
    }

    async fn list(&self) -> Result<Vec<ConfigKey>, CatalogError> {
        if !tokio::fs::try_exists(&self.root).await? {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let mut pending = vec![self.root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            let mut has_weights = false;
            while let Some(entry) = entries.next_entry().await? {
                let file_type = entry.file_type().await?;
                if file_type.is_dir() {
                    pending.push(entry.path());
                } else if entry.file_name() == WEIGHTS_FILE {
                    has_weights = true;
                }
            }
            if !has_weights {
                continue;
            }
            // Weights at the root itself are not an addressable adapter.
            match dir.strip_prefix(&self.root) {
                Ok(relative) if !relative.as_os_str().is_empty() => keys.push(key_for(relative)),
                _ => {}
            }
        }

        keys.sort_by(|a, b| b.cmp(a));
        Ok(keys)
    }
}
