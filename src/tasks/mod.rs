// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Task tracking for the scheduler.
//!
//! Holds task payloads, records, and the concurrent store that every
//! worker and the submission gateway write through.

mod payload;
mod record;
mod store;

pub use payload::{
    ExecutionMode, GenerationParams, ReferenceAudio, SynthesisRequest, TaskPayload,
    ValidationError,
};
pub use record::{ResultLocator, TaskId, TaskRecord, TaskStatus, TaskUpdate};
pub use store::{StoreError, TaskCounts, TaskStore};
