// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Metric recording through the `metrics` facade.
//!
//! Nothing is exported unless the embedding binary installs a recorder.

use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};

use crate::resources::ResourceId;
use crate::tasks::ExecutionMode;

/// Register descriptions for every metric this crate emits.
pub fn init_metrics() {
    describe_counter!("vox_tasks_submitted_total", "Tasks accepted by the gateway");
    describe_counter!("vox_tasks_completed_total", "Tasks that produced an artifact");
    describe_counter!("vox_tasks_failed_total", "Tasks that ended in failure");
    describe_counter!("vox_adapter_loads_total", "Adapter loads per resource");
    describe_histogram!("vox_task_duration_ms", "Task execution time in milliseconds");
    describe_gauge!("vox_queue_depth", "Tasks waiting in the dispatch queue");
}

pub fn record_task_submitted(mode: ExecutionMode) {
    counter!("vox_tasks_submitted_total", "mode" => mode.as_str()).increment(1);
}

pub fn record_task_completed(resource: ResourceId, duration: Duration) {
    counter!("vox_tasks_completed_total", "resource" => resource.to_string()).increment(1);
    histogram!("vox_task_duration_ms").record(duration.as_secs_f64() * 1000.0);
}

pub fn record_task_failed(resource: ResourceId, duration: Duration) {
    counter!("vox_tasks_failed_total", "resource" => resource.to_string()).increment(1);
    histogram!("vox_task_duration_ms").record(duration.as_secs_f64() * 1000.0);
}

pub fn record_adapter_load(resource: ResourceId) {
    counter!("vox_adapter_loads_total", "resource" => resource.to_string()).increment(1);
}

pub fn record_queue_depth(depth: usize) {
    gauge!("vox_queue_depth").set(depth as f64);
}
