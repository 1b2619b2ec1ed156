// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Health check support for the synthesis runtime.
//!
//! Liveness, readiness and a full report built from the resource pool,
//! the dispatch queue and the shutdown state.

use std::time::Instant;

use serde::Serialize;

use crate::resources::{DiscoverySource, ResourceRegistry, ResourceState};
use crate::shutdown::ShutdownState;

/// Overall health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum HealthState {
    Healthy,
    /// Serving, but on the fallback pool or with a backed-up queue.
    Degraded,
    Unhealthy,
}

/// Detailed health report.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub state: HealthState,
    pub ready: bool,
    pub accepting_requests: bool,
    pub discovery: String,
    pub resources: Vec<ResourceState>,
    pub queue_depth: usize,
    pub processing: usize,
    pub uptime_secs: u64,
}

/// Health check configuration.
#[derive(Debug, Clone)]
pub struct HealthConfig {
    /// Queue depth at which the runtime reports itself degraded.
    pub max_queue_depth: usize,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            max_queue_depth: 1000,
        }
    }
}

/// Inputs sampled from the running components.
#[derive(Debug, Clone, Copy)]
pub struct HealthInputs<'a> {
    pub shutdown_state: ShutdownState,
    pub registry: &'a ResourceRegistry,
    pub queue_depth: usize,
    pub processing: usize,
}

pub struct HealthChecker {
    config: HealthConfig,
    start_time: Instant,
}

impl HealthChecker {
    pub fn new(config: HealthConfig) -> Self {
        Self {
            config,
            start_time: Instant::now(),
        }
    }

    pub fn is_alive(&self) -> bool {
        true
    }

    /// Accepting submissions and not saturated.
    pub fn is_ready(&self, inputs: &HealthInputs<'_>) -> bool {
        inputs.shutdown_state == ShutdownState::Running
            && !inputs.registry.is_empty()
            && inputs.queue_depth < self.config.max_queue_depth
    }

    pub fn report(&self, inputs: &HealthInputs<'_>, resources: Vec<ResourceState>) -> HealthReport {
        HealthReport {
            state: self.compute_state(inputs),
            ready: self.is_ready(inputs),
            accepting_requests: inputs.shutdown_state == ShutdownState::Running,
            discovery: describe_source(inputs.registry.source()),
            resources,
            queue_depth: inputs.queue_depth,
            processing: inputs.processing,
            uptime_secs: self.start_time.elapsed().as_secs(),
        }
    }

    fn compute_state(&self, inputs: &HealthInputs<'_>) -> HealthState {
        if inputs.shutdown_state != ShutdownState::Running {
            return HealthState::Unhealthy;
        }
        if inputs.registry.is_degraded() || inputs.queue_depth >= self.config.max_queue_depth {
            return HealthState::Degraded;
        }
        HealthState::Healthy
    }
}

impl Default for HealthChecker {
    fn default() -> Self {
        Self::new(HealthConfig::default())
    }
}

fn describe_source(source: DiscoverySource) -> String {
    match source {
        DiscoverySource::Probe(name) => name.to_string(),
        DiscoverySource::Explicit => "explicit".to_string(),
        DiscoverySource::Fallback => "fallback".to_string(),
    }
}
