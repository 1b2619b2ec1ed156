// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Resource-affine worker pool.
//!
//! One long-lived worker per resource. Each worker pulls from the shared
//! queue and runs every task it takes on its own resource. A supervisor
//! restarts a worker that dies unexpectedly; only cancellation stops it.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::processor::{panic_message, TaskProcessor};
use super::queue::DispatchQueue;
use crate::resources::ResourceId;

/// Handles to the running workers.
pub struct WorkerPool {
    workers: Vec<(ResourceId, JoinHandle<()>)>,
}

impl WorkerPool {
    /// Spawn one supervised worker per resource.
    pub fn spawn(
        resources: &[ResourceId],
        queue: Arc<DispatchQueue>,
        processor: Arc<TaskProcessor>,
        poll_timeout: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        let workers = resources
            .iter()
            .map(|&resource| {
                let handle = tokio::spawn(supervise(
                    resource,
                    Arc::clone(&queue),
                    Arc::clone(&processor),
                    poll_timeout,
                    shutdown.clone(),
                ));
                (resource, handle)
            })
            .collect();
        Self { workers }
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    pub fn resources(&self) -> Vec<ResourceId> {
        self.workers.iter().map(|(id, _)| *id).collect()
    }

    /// Wait for every worker to exit. Call after cancelling the token.
    pub async fn join(self) {
        for (resource, handle) in self.workers {
            if let Err(e) = handle.await {
                tracing::error!(resource = %resource, error = %e, "worker supervisor ended abnormally");
            }
        }
    }
}

async fn supervise(
    resource: ResourceId,
    queue: Arc<DispatchQueue>,
    processor: Arc<TaskProcessor>,
    poll_timeout: Duration,
    shutdown: CancellationToken,
) {
    let mut restarts: u32 = 0;
    loop {
        let worker = tokio::spawn(worker_loop(
            resource,
            Arc::clone(&queue),
            Arc::clone(&processor),
            poll_timeout,
            shutdown.clone(),
        ));

        match worker.await {
            Ok(()) => break,
            Err(e) if e.is_panic() && !shutdown.is_cancelled() => {
                restarts += 1;
                let reason = panic_message(e.into_panic().as_ref());
                tracing::error!(
                    resource = %resource,
                    restarts,
                    error = %reason,
                    "worker panicked, restarting"
                );
            }
            Err(e) => {
                tracing::warn!(resource = %resource, error = %e, "worker stopped abnormally");
                break;
            }
        }
    }
}

async fn worker_loop(
    resource: ResourceId,
    queue: Arc<DispatchQueue>,
    processor: Arc<TaskProcessor>,
    poll_timeout: Duration,
    shutdown: CancellationToken,
) {
    tracing::info!(resource = %resource, "worker started");
    loop {
        let entry = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            entry = queue.dequeue_timeout(poll_timeout) => entry,
        };

        // An empty poll is the idle steady state.
        let Some(entry) = entry else { continue };

        tracing::debug!(
            resource = %resource,
            task_id = %entry.task_id,
            waited_ms = entry.wait_time().as_millis() as u64,
            "task dequeued"
        );
        processor
            .process(&entry.task_id, entry.payload, resource)
            .await;
    }
    tracing::info!(resource = %resource, "worker stopped");
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
