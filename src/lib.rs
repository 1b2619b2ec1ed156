// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! vox-runtime: multi-device task scheduler for speech synthesis.
//!
//! Accepts synthesis tasks, queues them, and executes each on exactly one
//! accelerator device at a time. Every device keeps the last adapter
//! configuration it loaded so consecutive tasks on the same adapter skip
//! the reload.
//!
//! # Components
//!
//! - **Resource registry**: ordered device pool discovered at startup
//! - **Resource state cache**: per-device exclusive lock plus loaded model
//! - **Task store**: concurrent status records, the client-visible truth
//! - **Dispatch queue**: unbounded FIFO shared by all workers
//! - **Worker pool**: one supervised worker per device
//! - **Submission gateway**: validation, record creation, queue or inline run
//!
//! Transport, the synthesis algorithm and audio transcoding live outside
//! this crate, behind [`engine::InferenceEngine`],
//! [`adapters::ConfigurationCatalog`] and [`engine::ArtifactWriter`].

pub mod adapters;
pub mod cli;
pub mod config;
pub mod engine;
pub mod health;
pub mod resources;
pub mod scheduler;
pub mod shutdown;
pub mod tasks;
pub mod telemetry;

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use adapters::ConfigurationCatalog;
use engine::{ArtifactWriter, InferenceEngine};
use health::{HealthChecker, HealthInputs, HealthReport};
use resources::{ResourceRegistry, ResourceStateCache};
use scheduler::{DispatchQueue, SubmissionGateway, TaskProcessor, WorkerPool};
use shutdown::{ShutdownCoordinator, ShutdownResult};
use tasks::{TaskStatus, TaskStore, TaskUpdate};

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// How long an idle worker waits on the queue before polling again.
    pub poll_timeout: Duration,
    /// Default and maximum size of a task listing.
    pub list_limit: usize,
    /// Bound on waiting for in-flight tasks at shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            poll_timeout: Duration::from_secs(2),
            list_limit: 50,
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

/// External services the scheduler drives.
pub struct Collaborators {
    pub catalog: Arc<dyn ConfigurationCatalog>,
    pub engine: Arc<dyn InferenceEngine>,
    pub writer: Arc<dyn ArtifactWriter>,
}

/// A running scheduler instance.
pub struct Runtime {
    registry: Arc<ResourceRegistry>,
    store: Arc<TaskStore>,
    cache: Arc<ResourceStateCache>,
    queue: Arc<DispatchQueue>,
    coordinator: Arc<ShutdownCoordinator>,
    gateway: Arc<SubmissionGateway>,
    workers: WorkerPool,
    worker_token: CancellationToken,
    health: HealthChecker,
    config: RuntimeConfig,
}

impl Runtime {
    /// Build every component and spawn one worker per resource.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(
        registry: ResourceRegistry,
        config: RuntimeConfig,
        collaborators: Collaborators,
    ) -> Self {
        telemetry::init_metrics();

        let registry = Arc::new(registry);
        let store = Arc::new(TaskStore::new());
        let cache = Arc::new(ResourceStateCache::new(registry.resources()));
        let queue = Arc::new(DispatchQueue::new());
        let coordinator = Arc::new(ShutdownCoordinator::new());

        let processor = Arc::new(TaskProcessor::new(
            Arc::clone(&store),
            Arc::clone(&cache),
            collaborators.catalog,
            collaborators.engine,
            collaborators.writer,
            Arc::clone(&coordinator),
        ));

        let gateway = Arc::new(SubmissionGateway::new(
            Arc::clone(&processor),
            Arc::clone(&queue),
            Arc::clone(&registry),
            Arc::clone(&coordinator),
            config.list_limit,
        ));

        let worker_token = CancellationToken::new();
        let workers = WorkerPool::spawn(
            registry.resources(),
            Arc::clone(&queue),
            processor,
            config.poll_timeout,
            worker_token.clone(),
        );

        tracing::info!(
            resources = ?registry.resources(),
            degraded = registry.is_degraded(),
            poll_timeout_ms = config.poll_timeout.as_millis() as u64,
            "runtime started"
        );

        Self {
            registry,
            store,
            cache,
            queue,
            coordinator,
            gateway,
            workers,
            worker_token,
            health: HealthChecker::default(),
            config,
        }
    }

    pub fn gateway(&self) -> &Arc<SubmissionGateway> {
        &self.gateway
    }

    pub fn registry(&self) -> &ResourceRegistry {
        &self.registry
    }

    pub fn cache(&self) -> &ResourceStateCache {
        &self.cache
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn health(&self) -> HealthReport {
        let inputs = HealthInputs {
            shutdown_state: self.coordinator.state(),
            registry: &self.registry,
            queue_depth: self.queue.len(),
            processing: self.store.stats().processing,
        };
        self.health.report(&inputs, self.cache.snapshot())
    }

    /// Stop accepting work, fail whatever is still queued, and wait for
    /// running tasks up to the configured timeout.
    pub async fn shutdown(self) -> ShutdownResult {
        tracing::info!("runtime shutting down");
        self.worker_token.cancel();

        let abandoned = self.queue.close();
        if !abandoned.is_empty() {
            tracing::warn!(count = abandoned.len(), "failing queued tasks at shutdown");
        }
        let reason = "runtime shut down before processing";
        for entry in abandoned {
            let update = TaskUpdate::new(TaskStatus::Failed)
                .message(format!("Task failed: {reason}"))
                .error(reason);
            if let Err(e) = self.store.update(&entry.task_id, update) {
                tracing::warn!(task_id = %entry.task_id, error = %e, "task store rejected update");
            }
        }

        let deadline = tokio::time::Instant::now() + self.config.shutdown_timeout;
        let result = self.coordinator.initiate(self.config.shutdown_timeout).await;

        let joined = tokio::time::timeout_at(deadline, self.workers.join()).await;
        if joined.is_err() {
            tracing::warn!("workers did not stop before the shutdown deadline");
        }

        match &result {
            ShutdownResult::Complete => tracing::info!("runtime stopped"),
            ShutdownResult::Timeout { remaining } => {
                tracing::warn!(remaining, "runtime stopped with tasks still running")
            }
        }
        result
    }
}
