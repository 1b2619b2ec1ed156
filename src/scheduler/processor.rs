// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! The processing routine shared by queued workers and sync submissions.
//!
//! One call takes a task from its first PROCESSING write to a terminal
//! record. Every error and panic raised while handling the task is caught
//! here and written to that task's record; nothing escapes to the caller.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use thiserror::Error;
use tracing::Instrument;

use crate::adapters::ConfigurationCatalog;
use crate::engine::{ArtifactError, ArtifactWriter, InferenceEngine, InferenceError, LoadError};
use crate::resources::{CacheError, ResourceId, ResourceStateCache};
use crate::shutdown::ShutdownCoordinator;
use crate::tasks::{ResultLocator, TaskId, TaskPayload, TaskStatus, TaskStore, TaskUpdate};
use crate::telemetry::{self, SpanExt, TaskSpan};

/// Terminal result of one processing run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome {
    Completed(ResultLocator),
    Failed(String),
}

#[derive(Debug, Error)]
enum ProcessError {
    #[error(transparent)]
    Resource(#[from] CacheError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error("Processing panicked: {0}")]
    Panicked(String),
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn join_message(err: tokio::task::JoinError) -> String {
    match err.try_into_panic() {
        Ok(payload) => panic_message(payload.as_ref()),
        Err(err) => err.to_string(),
    }
}

/// Drives one task through load, inference and persistence.
pub struct TaskProcessor {
    store: Arc<TaskStore>,
    cache: Arc<ResourceStateCache>,
    catalog: Arc<dyn ConfigurationCatalog>,
    engine: Arc<dyn InferenceEngine>,
    writer: Arc<dyn ArtifactWriter>,
    shutdown: Arc<ShutdownCoordinator>,
}

impl TaskProcessor {
    pub fn new(
        store: Arc<TaskStore>,
        cache: Arc<ResourceStateCache>,
        catalog: Arc<dyn ConfigurationCatalog>,
        engine: Arc<dyn InferenceEngine>,
        writer: Arc<dyn ArtifactWriter>,
        shutdown: Arc<ShutdownCoordinator>,
    ) -> Self {
        Self {
            store,
            cache,
            catalog,
            engine,
            writer,
            shutdown,
        }
    }

    pub fn store(&self) -> &Arc<TaskStore> {
        &self.store
    }

    pub fn cache(&self) -> &Arc<ResourceStateCache> {
        &self.cache
    }

    pub fn catalog(&self) -> &Arc<dyn ConfigurationCatalog> {
        &self.catalog
    }

    /// Run `task_id` on `resource` until it reaches a terminal status.
    ///
    /// The work runs on its own tokio task. A caller that stops waiting
    /// only gives up the outcome: the task still reaches a terminal record
    /// and keeps the resource locked until the engine call returns.
    pub async fn process(
        self: &Arc<Self>,
        task_id: &TaskId,
        payload: Arc<TaskPayload>,
        resource: ResourceId,
    ) -> TaskOutcome {
        let in_flight = self.shutdown.track_accepted();
        let this = Arc::clone(self);
        let id = task_id.clone();
        let handle = tokio::spawn(async move {
            let _in_flight = in_flight;
            this.drive(&id, payload, resource).await
        });

        match handle.await {
            Ok(outcome) => outcome,
            Err(e) => {
                let detail = format!("Processing aborted: {}", join_message(e));
                self.mark(
                    task_id,
                    TaskUpdate::new(TaskStatus::Failed)
                        .message(format!("Task failed: {detail}"))
                        .error(detail.clone())
                        .resource(resource),
                );
                TaskOutcome::Failed(detail)
            }
        }
    }

    async fn drive(
        &self,
        task_id: &TaskId,
        payload: Arc<TaskPayload>,
        resource: ResourceId,
    ) -> TaskOutcome {
        let span = TaskSpan::new(task_id, resource, &payload.adapter);
        let started = Instant::now();

        let result = AssertUnwindSafe(self.execute(task_id, &payload, resource))
            .catch_unwind()
            .instrument(span.clone())
            .await
            .unwrap_or_else(|panic| Err(ProcessError::Panicked(panic_message(panic.as_ref()))));

        let elapsed = started.elapsed();
        span.record_outcome(&result, elapsed);

        match result {
            Ok(locator) => {
                self.mark(
                    task_id,
                    TaskUpdate::new(TaskStatus::Completed)
                        .progress(1.0)
                        .message(format!("Synthesis complete (resource {resource})"))
                        .result(locator.clone())
                        .resource(resource),
                );
                telemetry::record_task_completed(resource, elapsed);
                tracing::info!(
                    task_id = %task_id,
                    resource = %resource,
                    result = %locator,
                    duration_ms = elapsed.as_millis() as u64,
                    "task completed"
                );
                TaskOutcome::Completed(locator)
            }
            Err(e) => {
                let detail = e.to_string();
                self.mark(
                    task_id,
                    TaskUpdate::new(TaskStatus::Failed)
                        .message(format!("Task failed: {detail}"))
                        .error(detail.clone())
                        .resource(resource),
                );
                telemetry::record_task_failed(resource, elapsed);
                tracing::error!(
                    task_id = %task_id,
                    resource = %resource,
                    error = %detail,
                    "task failed"
                );
                TaskOutcome::Failed(detail)
            }
        }
    }

    async fn execute(
        &self,
        task_id: &TaskId,
        payload: &Arc<TaskPayload>,
        resource: ResourceId,
    ) -> Result<ResultLocator, ProcessError> {
        let audio = {
            let mut guard = self.cache.lock(resource).await?;
            self.mark(
                task_id,
                TaskUpdate::processing(0.0, format!("Started on resource {resource}"))
                    .resource(resource),
            );

            let state = guard
                .ensure_loaded(&payload.adapter, self.catalog.as_ref(), &self.engine)
                .await?;
            self.mark(
                task_id,
                TaskUpdate::processing(0.1, format!("Adapter {} ready", payload.adapter)),
            );
            self.mark(
                task_id,
                TaskUpdate::processing(0.2, "Generation parameters prepared"),
            );
            self.mark(task_id, TaskUpdate::processing(0.3, "Generating audio"));

            let engine = Arc::clone(&self.engine);
            let input = Arc::clone(payload);
            tokio::task::spawn_blocking(move || engine.run(&state, &input))
                .await
                .map_err(|e| InferenceError::Panicked(join_message(e)))??
        };

        // The resource is free again; persistence touches no device state.
        self.mark(task_id, TaskUpdate::processing(0.8, "Persisting audio"));
        let writer = Arc::clone(&self.writer);
        let id = task_id.clone();
        let locator = tokio::task::spawn_blocking(move || writer.persist(&id, audio))
            .await
            .map_err(|e| ArtifactError::Panicked(join_message(e)))??;
        Ok(locator)
    }

    /// Write a status update. Rejections are logged, never propagated.
    fn mark(&self, task_id: &TaskId, update: TaskUpdate) {
        if let Err(e) = self.store.update(task_id, update) {
            tracing::warn!(task_id = %task_id, error = %e, "task store rejected update");
        }
    }
}
