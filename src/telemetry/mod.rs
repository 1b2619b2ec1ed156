// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Structured logging, task spans and metrics.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use self::metrics::{
    init_metrics, record_adapter_load, record_queue_depth, record_task_completed,
    record_task_failed, record_task_submitted,
};
pub use spans::{SpanExt, TaskSpan};
