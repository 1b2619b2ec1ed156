// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Submission gateway: the task-facing entry point.
//!
//! Validates a payload, creates its PENDING record and then either queues
//! it or runs it inline on the caller's path.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use super::processor::{TaskOutcome, TaskProcessor};
use super::queue::{DispatchQueue, QueueEntry, QueueError};
use crate::resources::{ResourceId, ResourceRegistry};
use crate::shutdown::ShutdownCoordinator;
use crate::tasks::{
    ExecutionMode, ResultLocator, TaskId, TaskPayload, TaskRecord, TaskStatus, TaskStore,
    TaskUpdate, ValidationError,
};
use crate::telemetry;

/// Attempts at drawing an unused task id before giving up.
const MAX_ID_ATTEMPTS: usize = 8;

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Runtime is shutting down")]
    ShuttingDown,

    #[error("Could not allocate a unique task id after {0} attempts")]
    IdSpaceExhausted(usize),

    #[error("Unknown resource: {0}")]
    UnknownResource(ResourceId),
}

/// Client-facing status of a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmitStatus {
    /// Queued; poll for progress.
    Submitted,
    Completed,
    Failed,
}

/// What a successful `submit` returns.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitResult {
    pub task_id: TaskId,
    pub status: SubmitStatus,
    pub message: String,
    pub estimated_time: f64,
    pub progress: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultLocator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Recent tasks plus pool summary.
#[derive(Debug, Clone, Serialize)]
pub struct TaskListing {
    pub tasks: Vec<TaskRecord>,
    /// Number of records returned.
    pub total: usize,
    /// Tasks currently PROCESSING across the whole store.
    pub processing: usize,
    /// Upper bound on simultaneous tasks (one per resource).
    pub max_concurrent: usize,
    pub available_resources: Vec<ResourceId>,
}

type IdGenerator = Box<dyn Fn() -> TaskId + Send + Sync>;

pub struct SubmissionGateway {
    processor: Arc<TaskProcessor>,
    queue: Arc<DispatchQueue>,
    registry: Arc<ResourceRegistry>,
    shutdown: Arc<ShutdownCoordinator>,
    list_limit: usize,
    next_id: IdGenerator,
}

impl SubmissionGateway {
    pub fn new(
        processor: Arc<TaskProcessor>,
        queue: Arc<DispatchQueue>,
        registry: Arc<ResourceRegistry>,
        shutdown: Arc<ShutdownCoordinator>,
        list_limit: usize,
    ) -> Self {
        Self {
            processor,
            queue,
            registry,
            shutdown,
            list_limit: list_limit.max(1),
            next_id: Box::new(TaskId::generate),
        }
    }

    /// Replace the task id source.
    pub fn with_id_generator(
        mut self,
        generator: impl Fn() -> TaskId + Send + Sync + 'static,
    ) -> Self {
        self.next_id = Box::new(generator);
        self
    }

    fn store(&self) -> &TaskStore {
        self.processor.store()
    }

    /// Submit a task. Sync payloads run on the first resource.
    pub async fn submit(&self, payload: TaskPayload) -> Result<SubmitResult, SubmitError> {
        self.submit_inner(payload, None).await
    }

    /// Submit a task; a sync payload runs on `resource`.
    ///
    /// Async payloads still go through the shared queue.
    pub async fn submit_on(
        &self,
        payload: TaskPayload,
        resource: ResourceId,
    ) -> Result<SubmitResult, SubmitError> {
        self.submit_inner(payload, Some(resource)).await
    }

    async fn submit_inner(
        &self,
        payload: TaskPayload,
        resource: Option<ResourceId>,
    ) -> Result<SubmitResult, SubmitError> {
        // Held for the whole submission so a drain waits for inline runs.
        let _admitted = self.shutdown.track().ok_or(SubmitError::ShuttingDown)?;
        payload.validate()?;
        if !self.processor.catalog().exists(&payload.adapter).await {
            return Err(ValidationError::UnknownAdapter(payload.adapter.to_string()).into());
        }
        let resource = match resource {
            Some(id) if !self.registry.contains(id) => {
                return Err(SubmitError::UnknownResource(id));
            }
            Some(id) => id,
            None => self.registry.primary(),
        };

        let estimate = payload.estimate_secs();
        let task_id = self.create_record(estimate)?;
        telemetry::record_task_submitted(payload.mode);
        tracing::info!(
            task_id = %task_id,
            adapter = %payload.adapter,
            mode = payload.mode.as_str(),
            estimated_secs = estimate,
            "task submitted"
        );

        let payload = Arc::new(payload);
        match payload.mode {
            ExecutionMode::Async => self.enqueue(task_id, payload, estimate),
            ExecutionMode::Sync => Ok(self.run_inline(task_id, payload, resource, estimate).await),
        }
    }

    fn create_record(&self, estimate: f64) -> Result<TaskId, SubmitError> {
        for _ in 0..MAX_ID_ATTEMPTS {
            let task_id = (self.next_id)();
            match self.store().create(task_id.clone(), estimate) {
                Ok(()) => return Ok(task_id),
                Err(e) => tracing::warn!(error = %e, "task id collision, regenerating"),
            }
        }
        Err(SubmitError::IdSpaceExhausted(MAX_ID_ATTEMPTS))
    }

    fn enqueue(
        &self,
        task_id: TaskId,
        payload: Arc<TaskPayload>,
        estimate: f64,
    ) -> Result<SubmitResult, SubmitError> {
        match self.queue.enqueue(QueueEntry::new(task_id.clone(), payload)) {
            Ok(position) => {
                tracing::info!(task_id = %task_id, position, "task queued");
                Ok(SubmitResult {
                    task_id,
                    status: SubmitStatus::Submitted,
                    message: "Task submitted to queue".to_string(),
                    estimated_time: estimate,
                    progress: 0.0,
                    result: None,
                    error: None,
                })
            }
            Err(QueueError::Closed) => {
                // Lost the race with shutdown; never leave the record pending.
                let reason = "runtime shut down before processing";
                if let Err(e) = self.store().update(
                    &task_id,
                    TaskUpdate::new(TaskStatus::Failed)
                        .message(format!("Task failed: {reason}"))
                        .error(reason),
                ) {
                    tracing::warn!(task_id = %task_id, error = %e, "task store rejected update");
                }
                Err(SubmitError::ShuttingDown)
            }
        }
    }

    async fn run_inline(
        &self,
        task_id: TaskId,
        payload: Arc<TaskPayload>,
        resource: ResourceId,
        estimate: f64,
    ) -> SubmitResult {
        let outcome = self.processor.process(&task_id, payload, resource).await;
        let record = self.store().get(&task_id);
        let message = record
            .as_ref()
            .map(|r| r.message.clone())
            .unwrap_or_default();
        let progress = record.as_ref().map_or(0.0, |r| r.progress);

        match outcome {
            TaskOutcome::Completed(locator) => SubmitResult {
                task_id,
                status: SubmitStatus::Completed,
                message,
                estimated_time: estimate,
                progress,
                result: Some(locator),
                error: None,
            },
            TaskOutcome::Failed(detail) => SubmitResult {
                task_id,
                status: SubmitStatus::Failed,
                message,
                estimated_time: estimate,
                progress,
                result: None,
                error: Some(detail),
            },
        }
    }

    /// Current record of one task.
    pub fn get_status(&self, task_id: &TaskId) -> Option<TaskRecord> {
        self.store().get(task_id)
    }

    /// Most recent tasks, newest first. `limit` is capped at the configured
    /// maximum and defaults to it.
    pub fn list(&self, status: Option<TaskStatus>, limit: Option<usize>) -> TaskListing {
        let limit = limit.unwrap_or(self.list_limit).min(self.list_limit);
        let tasks = self.store().list(status, limit);
        TaskListing {
            total: tasks.len(),
            tasks,
            processing: self.store().stats().processing,
            max_concurrent: self.registry.len(),
            available_resources: self.registry.resources().to_vec(),
        }
    }

    pub fn queue_depth(&self) -> usize {
        self.queue.len()
    }
}
