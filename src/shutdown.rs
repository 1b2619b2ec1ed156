// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Graceful shutdown coordination.
//!
//! Shutdown stops new submissions first, then waits for tasks that are
//! already executing to finish, bounded by a timeout.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::watch;

/// Shutdown state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    Running,
    Draining,
    Stopped,
}

/// Result of a shutdown operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownResult {
    Complete,
    /// The deadline passed with `remaining` tasks still executing.
    Timeout { remaining: usize },
}

/// Tracks whether submissions are accepted and how many tasks are running.
pub struct ShutdownCoordinator {
    state: watch::Sender<ShutdownState>,
    running: Arc<watch::Sender<usize>>,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        let (state, _) = watch::channel(ShutdownState::Running);
        let (running, _) = watch::channel(0usize);
        Self {
            state,
            running: Arc::new(running),
        }
    }

    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    /// Check if new submissions are accepted.
    pub fn is_accepting(&self) -> bool {
        self.state() == ShutdownState::Running
    }

    /// Track a new unit of work. Returns None once shutdown has begun.
    pub fn track(&self) -> Option<ShutdownGuard> {
        // Count first so a drain that starts right now cannot miss us.
        let guard = self.track_accepted();
        if self.is_accepting() {
            Some(guard)
        } else {
            None
        }
    }

    /// Track work that was accepted before shutdown began.
    ///
    /// Workers use this for tasks already dequeued, so a drain waits for
    /// them instead of abandoning them mid-run.
    pub fn track_accepted(&self) -> ShutdownGuard {
        self.running.send_modify(|n| *n += 1);
        ShutdownGuard {
            running: Arc::clone(&self.running),
        }
    }

    pub fn in_flight(&self) -> usize {
        *self.running.borrow()
    }

    /// Stop accepting and wait up to `timeout` for running work to finish.
    pub async fn initiate(&self, timeout: Duration) -> ShutdownResult {
        self.state.send_replace(ShutdownState::Draining);
        let started = Instant::now();

        let mut running = self.running.subscribe();
        let drained = tokio::time::timeout(timeout, running.wait_for(|n| *n == 0)).await;

        let result = match drained {
            Ok(_) => ShutdownResult::Complete,
            Err(_) => match self.in_flight() {
                0 => ShutdownResult::Complete,
                remaining => ShutdownResult::Timeout { remaining },
            },
        };

        self.state.send_replace(ShutdownState::Stopped);
        tracing::debug!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            ?result,
            "drain finished"
        );
        result
    }
}

impl Default for ShutdownCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

/// Counts one running task until dropped.
pub struct ShutdownGuard {
    running: Arc<watch::Sender<usize>>,
}

impl Drop for ShutdownGuard {
    fn drop(&mut self) {
        self.running.send_modify(|n| *n = n.saturating_sub(1));
    }
}
