// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Task scheduling: the shared dispatch queue, the resource-affine worker
//! pool, the processing routine and the submission gateway.

mod gateway;
mod processor;
mod queue;
mod worker;

pub use gateway::{SubmissionGateway, SubmitError, SubmitResult, SubmitStatus, TaskListing};
pub use processor::{TaskOutcome, TaskProcessor};
pub use queue::{DispatchQueue, QueueEntry, QueueError};
pub use worker::WorkerPool;
