// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Engine error types.
//!
//! Every failure is reported to the caller; nothing here is retried.

use thiserror::Error;

use crate::adapters::CatalogError;
use crate::resources::ResourceId;

/// Binding a configuration onto a resource failed.
///
/// The resource is left with no configuration loaded.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Adapter resolution failed: {0}")]
    Catalog(#[from] CatalogError),

    #[error("Load failed on resource {resource}: {reason}")]
    Failed { resource: ResourceId, reason: String },

    #[error("Load panicked: {0}")]
    Panicked(String),
}

/// Errors raised while producing audio.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("Input validation failed: {0}")]
    InputValidation(String),

    #[error("Model error: {0}")]
    ModelError(String),

    #[error("Inference panicked: {0}")]
    Panicked(String),
}

/// Persisting an artifact failed.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("WAV encoding failed: {0}")]
    Encode(#[from] hound::Error),

    #[error("Engine returned no audio samples")]
    EmptyAudio,

    #[error("Artifact writer panicked: {0}")]
    Panicked(String),
}
