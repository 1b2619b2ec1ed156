// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Span helpers for task execution.

use std::time::Duration;

use tracing::{info_span, Span};

use crate::adapters::ConfigKey;
use crate::resources::ResourceId;
use crate::tasks::{TaskId, TaskStatus};

/// Records how a task ended on its span.
pub trait SpanExt {
    fn record_outcome<T, E>(&self, result: &Result<T, E>, elapsed: Duration)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_outcome<T, E>(&self, result: &Result<T, E>, elapsed: Duration)
    where
        E: std::fmt::Display,
    {
        let status = match result {
            Ok(_) => TaskStatus::Completed,
            Err(e) => {
                self.record("error", e.to_string().as_str());
                TaskStatus::Failed
            }
        };
        self.record("status", status.as_str());
        self.record("duration_ms", elapsed.as_millis() as u64);
    }
}

/// Factory for task execution spans.
pub struct TaskSpan;

impl TaskSpan {
    /// Span covering one task on one resource.
    ///
    /// `status`, `error` and `duration_ms` start empty and are filled in
    /// by [`SpanExt::record_outcome`].
    pub fn new(task_id: &TaskId, resource: ResourceId, adapter: &ConfigKey) -> Span {
        info_span!(
            "synthesis_task",
            task_id = %task_id,
            resource = %resource,
            adapter = %adapter,
            status = tracing::field::Empty,
            error = tracing::field::Empty,
            duration_ms = tracing::field::Empty,
        )
    }
}
