// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Synthesis engine seam.
//!
//! The scheduler never touches model internals. It asks an
//! [`InferenceEngine`] to bind a configuration onto a resource, to run one
//! payload against the bound state, and hands raw audio to an
//! [`ArtifactWriter`]. Both calls are blocking and run off the async
//! executor.

mod artifact;
mod error;

use std::any::Any;
use std::sync::Arc;

pub use artifact::{ArtifactWriter, WavArtifactWriter};
pub use error::{ArtifactError, InferenceError, LoadError};

use crate::adapters::{ConfigKey, ConfigurationDescriptor};
use crate::resources::ResourceId;
use crate::tasks::TaskPayload;

/// Model state bound to one resource.
///
/// Dropping the last reference releases the state.
pub trait LoadedModel: Send + Sync {
    /// Configuration this state was built for.
    fn adapter(&self) -> &ConfigKey;

    /// Downcast hook for engines that need their concrete type back.
    fn as_any(&self) -> &dyn Any;
}

/// Shared handle to a loaded model.
pub type StateRef = Arc<dyn LoadedModel>;

/// Mono PCM samples produced by one run.
#[derive(Debug, Clone, PartialEq)]
pub struct RawAudio {
    /// Samples in `[-1.0, 1.0]`.
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl RawAudio {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self { samples, sample_rate }
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / f64::from(self.sample_rate)
    }
}

/// Blocking model backend.
///
/// Called only while the caller holds the resource's exclusive lock, so an
/// implementation never sees two concurrent calls for the same resource.
pub trait InferenceEngine: Send + Sync + 'static {
    /// Build state for `descriptor` on `resource`.
    fn load(
        &self,
        resource: ResourceId,
        descriptor: &ConfigurationDescriptor,
    ) -> Result<StateRef, LoadError>;

    /// Synthesize `payload` with previously loaded state.
    fn run(&self, state: &StateRef, payload: &TaskPayload) -> Result<RawAudio, InferenceError>;
}
