// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Task payloads: the immutable input bundle a task carries.

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::adapters::ConfigKey;

/// Seconds added per input character when estimating duration.
const SECS_PER_CHAR: f64 = 0.3;
/// Lower bound of any estimate, in seconds.
const MIN_ESTIMATE_SECS: f64 = 30.0;

/// Payload rejected before it ever reaches the store or the queue.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("Adapter '{0}' not found")]
    UnknownAdapter(String),

    #[error("Malformed payload: {0}")]
    Malformed(String),
}

/// How the gateway executes a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Enqueue and return immediately.
    #[default]
    Async,
    /// Run inline on the caller's path, bypassing the queue.
    Sync,
}

impl ExecutionMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Async => "async",
            Self::Sync => "sync",
        }
    }
}

/// Numeric generation parameters handed to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationParams {
    /// Classifier-free guidance scale.
    pub cfg_scale: f32,
    /// Diffusion steps.
    pub steps: u32,
    /// `None` leaves the engine unseeded.
    pub seed: Option<u64>,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self { cfg_scale: 2.0, steps: 10, seed: None }
    }
}

/// Reference material for voice cloning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceAudio {
    pub audio_path: PathBuf,
    /// Transcript of the reference clip, if known.
    pub text: Option<String>,
}

/// Everything a task needs. Created once at submission, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub text: String,
    pub adapter: ConfigKey,
    pub params: GenerationParams,
    pub reference: Option<ReferenceAudio>,
    pub mode: ExecutionMode,
}

impl TaskPayload {
    /// Build an async payload on the base model with default parameters.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            adapter: ConfigKey::base(),
            params: GenerationParams::default(),
            reference: None,
            mode: ExecutionMode::Async,
        }
    }

    pub fn with_adapter(mut self, adapter: ConfigKey) -> Self {
        self.adapter = adapter;
        self
    }

    pub fn with_params(mut self, params: GenerationParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_reference(mut self, reference: ReferenceAudio) -> Self {
        self.reference = Some(reference);
        self
    }

    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Structural checks that need no collaborator.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.text.trim().is_empty() {
            return Err(ValidationError::Malformed("text cannot be empty".into()));
        }
        if self.params.steps == 0 {
            return Err(ValidationError::Malformed("steps must be at least 1".into()));
        }
        if !self.params.cfg_scale.is_finite() || self.params.cfg_scale <= 0.0 {
            return Err(ValidationError::Malformed(
                "cfg_scale must be a positive number".into(),
            ));
        }
        if let Some(reference) = &self.reference {
            if reference.audio_path.as_os_str().is_empty() {
                return Err(ValidationError::Malformed(
                    "reference audio path cannot be empty".into(),
                ));
            }
        }
        Ok(())
    }

    /// Client-facing duration estimate in seconds. Has no scheduling effect.
    pub fn estimate_secs(&self) -> f64 {
        let chars = self.text.chars().count() as f64;
        (chars * SECS_PER_CHAR + f64::from(self.params.steps)).max(MIN_ESTIMATE_SECS)
    }
}

/// Flat request shape accepted by the request-handling layer.
///
/// Field names and defaults follow the public synthesis API; use
/// [`SynthesisRequest::into_payload`] to obtain a [`TaskPayload`].
#[derive(Debug, Clone, Deserialize)]
pub struct SynthesisRequest {
    pub text: String,
    #[serde(default)]
    pub lora_name: ConfigKey,
    #[serde(default = "default_cfg_scale")]
    pub cfg_scale: f32,
    #[serde(default = "default_steps")]
    pub steps: u32,
    /// `-1` (or any negative value) means unseeded.
    #[serde(default, deserialize_with = "deserialize_seed")]
    pub seed: Option<u64>,
    #[serde(default)]
    pub ref_audio_path: Option<PathBuf>,
    #[serde(default)]
    pub ref_text: Option<String>,
    #[serde(default = "default_async_mode")]
    pub async_mode: bool,
}

fn default_cfg_scale() -> f32 {
    2.0
}

fn default_steps() -> u32 {
    10
}

fn default_async_mode() -> bool {
    true
}

fn deserialize_seed<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<i64>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| u64::try_from(s).ok()))
}

impl SynthesisRequest {
    pub fn into_payload(self) -> TaskPayload {
        let reference = self.ref_audio_path.map(|audio_path| ReferenceAudio {
            audio_path,
            text: self.ref_text,
        });
        let mode = if self.async_mode { ExecutionMode::Async } else { ExecutionMode::Sync };
        TaskPayload {
            text: self.text,
            adapter: self.lora_name,
            params: GenerationParams {
                cfg_scale: self.cfg_scale,
                steps: self.steps,
                seed: self.seed,
            },
            reference,
            mode,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn estimate_has_floor_and_grows_with_input() {
        let short = TaskPayload::new("hi");
        assert_eq!(short.estimate_secs(), MIN_ESTIMATE_SECS);

        let long = TaskPayload::new("x".repeat(200));
        assert!((long.estimate_secs() - 70.0).abs() < 1e-9);

        let more_steps = TaskPayload::new("x".repeat(200)).with_params(GenerationParams {
            steps: 40,
            ..GenerationParams::default()
        });
        assert!(more_steps.estimate_secs() > long.estimate_secs());
    }

    #[test]
    fn validate_rejects_malformed_payloads() {
        assert!(TaskPayload::new("   ").validate().is_err());

        let zero_steps = TaskPayload::new("hello").with_params(GenerationParams {
            steps: 0,
            ..GenerationParams::default()
        });
        assert!(matches!(zero_steps.validate(), Err(ValidationError::Malformed(_))));

        let nan_cfg = TaskPayload::new("hello").with_params(GenerationParams {
            cfg_scale: f32::NAN,
            ..GenerationParams::default()
        });
        assert!(nan_cfg.validate().is_err());

        assert!(TaskPayload::new("hello").validate().is_ok());
    }

    #[test]
    fn request_defaults_match_public_api() {
        let req: SynthesisRequest = serde_json::from_str(r#"{"text": "hello"}"#).unwrap();
        let payload = req.into_payload();
        assert_eq!(payload.params, GenerationParams::default());
        assert_eq!(payload.mode, ExecutionMode::Async);
        assert!(payload.adapter.is_base());
        assert!(payload.reference.is_none());
    }

    #[test]
    fn negative_seed_means_unseeded() {
        let req: SynthesisRequest =
            serde_json::from_str(r#"{"text": "a", "seed": -1, "async_mode": false}"#).unwrap();
        let payload = req.into_payload();
        assert_eq!(payload.params.seed, None);
        assert_eq!(payload.mode, ExecutionMode::Sync);

        let req: SynthesisRequest =
            serde_json::from_str(r#"{"text": "a", "seed": 42, "lora_name": "speaker_a"}"#).unwrap();
        let payload = req.into_payload();
        assert_eq!(payload.params.seed, Some(42));
        assert_eq!(payload.adapter.as_str(), "speaker_a");
    }

    #[test]
    fn reference_text_travels_with_audio_path() {
        let req: SynthesisRequest = serde_json::from_str(
            r#"{"text": "a", "ref_audio_path": "ref.wav", "ref_text": "hello there"}"#,
        )
        .unwrap();
        let reference = req.into_payload().reference.unwrap();
        assert_eq!(reference.audio_path, PathBuf::from("ref.wav"));
        assert_eq!(reference.text.as_deref(), Some("hello there"));
    }
}
