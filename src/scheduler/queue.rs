// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Shared dispatch queue.
//!
//! One FIFO feeds every worker. Whichever worker is idle takes the oldest
//! entry; there is no per-resource routing and no priority.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tokio::sync::Notify;

use crate::tasks::{TaskId, TaskPayload};

/// A task waiting for a worker.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub task_id: TaskId,
    pub payload: Arc<TaskPayload>,
    pub enqueued_at: Instant,
}

impl QueueEntry {
    pub fn new(task_id: TaskId, payload: Arc<TaskPayload>) -> Self {
        Self {
            task_id,
            payload,
            enqueued_at: Instant::now(),
        }
    }

    /// Time spent waiting so far.
    pub fn wait_time(&self) -> Duration {
        self.enqueued_at.elapsed()
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    #[error("dispatch queue is closed")]
    Closed,
}

struct Inner {
    entries: VecDeque<QueueEntry>,
    closed: bool,
}

/// Unbounded FIFO of pending tasks, safe for many producers and consumers.
pub struct DispatchQueue {
    inner: Mutex<Inner>,
    notify: Notify,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: VecDeque::new(),
                closed: false,
            }),
            notify: Notify::new(),
        }
    }

    /// Append an entry. Returns its zero-based position at insertion time.
    pub fn enqueue(&self, entry: QueueEntry) -> Result<usize, QueueError> {
        let mut inner = self.inner.lock();
        if inner.closed {
            return Err(QueueError::Closed);
        }
        let position = inner.entries.len();
        inner.entries.push_back(entry);
        let depth = inner.entries.len();
        drop(inner);

        crate::telemetry::record_queue_depth(depth);
        self.notify.notify_one();
        Ok(position)
    }

    /// Take the oldest entry without waiting.
    pub fn try_dequeue(&self) -> Option<QueueEntry> {
        let mut inner = self.inner.lock();
        let entry = inner.entries.pop_front();
        if entry.is_some() {
            crate::telemetry::record_queue_depth(inner.entries.len());
        }
        entry
    }

    /// Take the oldest entry, waiting up to `timeout` for one to arrive.
    ///
    /// Returns `None` on timeout so callers can re-check shutdown.
    pub async fn dequeue_timeout(&self, timeout: Duration) -> Option<QueueEntry> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.notify.notified();
            if let Some(entry) = self.try_dequeue() {
                return Some(entry);
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.try_dequeue();
            }
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Refuse further entries and hand back everything still waiting.
    pub fn close(&self) -> Vec<QueueEntry> {
        let mut inner = self.inner.lock();
        inner.closed = true;
        let drained: Vec<QueueEntry> = inner.entries.drain(..).collect();
        drop(inner);

        crate::telemetry::record_queue_depth(0);
        self.notify.notify_waiters();
        drained
    }
}

impl Default for DispatchQueue {
    fn default() -> Self {
        Self::new()
    }
}
