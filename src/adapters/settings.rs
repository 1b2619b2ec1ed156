// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Adapter settings parsed from a checkpoint's `lora_config.json`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Key of the base model with no adapter bound.
const BASE_KEY: &str = "none";

/// Identifier selecting which adapter must be bound before inference.
///
/// The distinguished [`ConfigKey::base`] means "base model only". Empty
/// names and the literal `None`/`none` normalise to the base key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ConfigKey(String);

impl ConfigKey {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() || trimmed.eq_ignore_ascii_case(BASE_KEY) {
            Self::base()
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn base() -> Self {
        Self(BASE_KEY.to_string())
    }

    pub fn is_base(&self) -> bool {
        self.0 == BASE_KEY
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ConfigKey {
    fn default() -> Self {
        Self::base()
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConfigKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl<'de> Deserialize<'de> for ConfigKey {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.map(Self::new).unwrap_or_default())
    }
}

/// Low-rank adapter hyper-parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdapterSettings {
    pub enable_lm: bool,
    pub enable_dit: bool,
    pub r: u32,
    pub alpha: u32,
    pub target_modules_lm: Vec<String>,
    pub target_modules_dit: Vec<String>,
    /// Fields the engine understands but the scheduler does not interpret.
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn attention_projections() -> Vec<String> {
    ["q_proj", "v_proj", "k_proj", "o_proj"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for AdapterSettings {
    fn default() -> Self {
        Self {
            enable_lm: true,
            enable_dit: true,
            r: 32,
            alpha: 16,
            target_modules_lm: attention_projections(),
            target_modules_dit: attention_projections(),
            extra: serde_json::Map::new(),
        }
    }
}

/// On-disk layout of `lora_config.json`.
#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct CheckpointInfo {
    #[serde(default)]
    pub base_model: Option<String>,
    #[serde(default)]
    pub lora_config: Option<AdapterSettings>,
}
