// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Concurrent task store: the single source of truth for task status.
//!
//! Backed by a sharded map, so a writer holds a lock only for the duration
//! of one record mutation. Records are never removed.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::Serialize;
use thiserror::Error;

use super::record::{TaskId, TaskRecord, TaskStatus, TaskUpdate};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("Task already exists: {0}")]
    Duplicate(TaskId),

    #[error("Task not found: {0}")]
    UnknownTask(TaskId),

    #[error("Task {id} is already {status}")]
    Terminal { id: TaskId, status: TaskStatus },

    #[error("Task {id} cannot move from {from} back to {to}")]
    Backward { id: TaskId, from: TaskStatus, to: TaskStatus },
}

/// Per-status task counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TaskCounts {
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub failed: usize,
}

impl TaskCounts {
    pub fn total(&self) -> usize {
        self.pending + self.processing + self.completed + self.failed
    }
}

/// Thread-safe mapping from task id to task record.
pub struct TaskStore {
    records: DashMap<TaskId, TaskRecord>,
}

impl TaskStore {
    pub fn new() -> Self {
        Self { records: DashMap::new() }
    }

    /// Insert a fresh `Pending` record. Fails if the id is taken.
    pub fn create(&self, id: TaskId, estimated_time: f64) -> Result<(), StoreError> {
        match self.records.entry(id) {
            Entry::Occupied(entry) => Err(StoreError::Duplicate(entry.key().clone())),
            Entry::Vacant(entry) => {
                let record = TaskRecord::pending(entry.key().clone(), estimated_time);
                entry.insert(record);
                Ok(())
            }
        }
    }

    /// Apply a partial update.
    ///
    /// Status may only move forward and never changes once terminal.
    /// Progress is clamped to `[0, 1]` and a lower value than the current
    /// one is ignored. `updated_at` is refreshed on every accepted write.
    pub fn update(&self, id: &TaskId, update: TaskUpdate) -> Result<(), StoreError> {
        let mut entry = self
            .records
            .get_mut(id)
            .ok_or_else(|| StoreError::UnknownTask(id.clone()))?;
        let record = entry.value_mut();

        if record.status.is_terminal() {
            return Err(StoreError::Terminal { id: id.clone(), status: record.status });
        }
        if update.status.rank() < record.status.rank() {
            return Err(StoreError::Backward {
                id: id.clone(),
                from: record.status,
                to: update.status,
            });
        }

        record.status = update.status;
        record.updated_at = Utc::now();

        if let Some(progress) = update.progress {
            let progress = progress.clamp(0.0, 1.0);
            if progress > record.progress {
                record.progress = progress;
            }
        }
        if let Some(message) = update.message {
            record.message = message;
        }
        if let Some(resource_id) = update.resource_id {
            record.resource_id = Some(resource_id);
        }
        if let Some(result) = update.result {
            record.result = Some(result);
        }
        if let Some(error) = update.error {
            record.error = Some(error);
        }

        // A terminal record carries a result or an error, never both.
        match record.status {
            TaskStatus::Completed => record.error = None,
            TaskStatus::Failed => record.result = None,
            TaskStatus::Pending | TaskStatus::Processing => {}
        }

        Ok(())
    }

    /// Snapshot of one record.
    pub fn get(&self, id: &TaskId) -> Option<TaskRecord> {
        self.records.get(id).map(|r| r.value().clone())
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.records.contains_key(id)
    }

    /// Most recent records first, optionally filtered by status.
    pub fn list(&self, status: Option<TaskStatus>, limit: usize) -> Vec<TaskRecord> {
        let mut records: Vec<TaskRecord> = self
            .records
            .iter()
            .filter(|r| status.map_or(true, |s| r.status == s))
            .map(|r| r.value().clone())
            .collect();
        records.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.task_id.cmp(&b.task_id))
        });
        records.truncate(limit);
        records
    }

    /// Count records per status.
    pub fn stats(&self) -> TaskCounts {
        let mut counts = TaskCounts::default();
        for record in self.records.iter() {
            match record.status {
                TaskStatus::Pending => counts.pending += 1,
                TaskStatus::Processing => counts.processing += 1,
                TaskStatus::Completed => counts.completed += 1,
                TaskStatus::Failed => counts.failed += 1,
            }
        }
        counts
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl Default for TaskStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tasks::record::ResultLocator;

    fn store_with(id: &str) -> (TaskStore, TaskId) {
        let store = TaskStore::new();
        let id = TaskId::from(id);
        store.create(id.clone(), 30.0).unwrap();
        (store, id)
    }

    #[test]
    fn create_rejects_duplicate_ids() {
        let (store, id) = store_with("dup00001");
        assert_eq!(store.create(id.clone(), 10.0), Err(StoreError::Duplicate(id)));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn update_unknown_task_is_an_error_not_a_panic() {
        let store = TaskStore::new();
        let err = store
            .update(&TaskId::from("missing1"), TaskUpdate::processing(0.1, "x"))
            .unwrap_err();
        assert!(matches!(err, StoreError::UnknownTask(_)));
    }

    #[test]
    fn partial_update_only_touches_supplied_fields() {
        let (store, id) = store_with("partial1");
        store
            .update(&id, TaskUpdate::processing(0.3, "Generating audio"))
            .unwrap();
        let before = store.get(&id).unwrap();

        store.update(&id, TaskUpdate::new(TaskStatus::Processing)).unwrap();
        let after = store.get(&id).unwrap();

        assert_eq!(after.message, "Generating audio");
        assert_eq!(after.progress, 0.3);
        assert!(after.updated_at >= before.updated_at);
    }

    #[test]
    fn progress_never_decreases_and_is_clamped() {
        let (store, id) = store_with("progres1");
        store.update(&id, TaskUpdate::processing(0.8, "a")).unwrap();
        store.update(&id, TaskUpdate::processing(0.2, "b")).unwrap();
        assert_eq!(store.get(&id).unwrap().progress, 0.8);

        store.update(&id, TaskUpdate::processing(7.0, "c")).unwrap();
        assert_eq!(store.get(&id).unwrap().progress, 1.0);
    }

    #[test]
    fn terminal_records_are_frozen() {
        let (store, id) = store_with("frozen01");
        store
            .update(
                &id,
                TaskUpdate::new(TaskStatus::Completed)
                    .progress(1.0)
                    .result(ResultLocator::new("out.wav")),
            )
            .unwrap();

        let err = store
            .update(&id, TaskUpdate::new(TaskStatus::Failed).error("late"))
            .unwrap_err();
        assert!(matches!(err, StoreError::Terminal { status: TaskStatus::Completed, .. }));

        let record = store.get(&id).unwrap();
        assert_eq!(record.status, TaskStatus::Completed);
        assert!(record.error.is_none());
    }

    #[test]
    fn status_cannot_move_backward() {
        let (store, id) = store_with("backwrd1");
        store.update(&id, TaskUpdate::processing(0.0, "go")).unwrap();
        let err = store.update(&id, TaskUpdate::new(TaskStatus::Pending)).unwrap_err();
        assert!(matches!(err, StoreError::Backward { .. }));
        assert_eq!(store.get(&id).unwrap().status, TaskStatus::Processing);
    }

    #[test]
    fn failed_record_never_carries_a_result() {
        let (store, id) = store_with("failres1");
        store
            .update(
                &id,
                TaskUpdate::new(TaskStatus::Failed)
                    .result(ResultLocator::new("stray.wav"))
                    .error("boom"),
            )
            .unwrap();
        let record = store.get(&id).unwrap();
        assert!(record.result.is_none());
        assert_eq!(record.error.as_deref(), Some("boom"));
    }

    #[test]
    fn list_filters_and_limits() {
        let store = TaskStore::new();
        for i in 0..5 {
            store.create(TaskId::from(format!("task000{i}")), 30.0).unwrap();
        }
        store
            .update(&TaskId::from("task0002"), TaskUpdate::processing(0.1, "x"))
            .unwrap();

        assert_eq!(store.list(None, 3).len(), 3);
        let processing = store.list(Some(TaskStatus::Processing), 50);
        assert_eq!(processing.len(), 1);
        assert_eq!(processing[0].task_id.as_str(), "task0002");

        let all = store.list(None, 50);
        assert!(all.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[test]
    fn stats_counts_each_status() {
        let store = TaskStore::new();
        for i in 0..3 {
            store.create(TaskId::from(format!("stat000{i}")), 30.0).unwrap();
        }
        store
            .update(&TaskId::from("stat0000"), TaskUpdate::processing(0.0, "x"))
            .unwrap();
        store
            .update(&TaskId::from("stat0001"), TaskUpdate::new(TaskStatus::Failed).error("e"))
            .unwrap();

        let counts = store.stats();
        assert_eq!(counts.pending, 1);
        assert_eq!(counts.processing, 1);
        assert_eq!(counts.failed, 1);
        assert_eq!(counts.total(), 3);
    }
}
