// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Task records and the status state machine.

use std::fmt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::resources::ResourceId;

/// Opaque task identifier, unique within the process lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    /// Length of a generated identifier in hex characters.
    pub const LEN: usize = 8;

    /// Generate a short random identifier (first 8 hex chars of a UUID v4).
    pub fn generate() -> Self {
        let simple = uuid::Uuid::new_v4().simple().to_string();
        Self(simple[..Self::LEN].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Task lifecycle: `Pending -> Processing -> {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    /// Forward order of the state machine. Terminal states share a rank.
    pub fn rank(self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Processing => 1,
            Self::Completed | Self::Failed => 2,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(format!("unknown task status: {other}")),
        }
    }
}

/// Location of a persisted artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResultLocator(PathBuf);

impl ResultLocator {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for ResultLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Snapshot of one task's observable state.
#[derive(Debug, Clone, Serialize)]
pub struct TaskRecord {
    pub task_id: TaskId,
    pub status: TaskStatus,
    /// Fraction complete in `[0, 1]`; never decreases.
    pub progress: f64,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Rough client-facing estimate in seconds.
    pub estimated_time: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<ResultLocator>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resource_id: Option<ResourceId>,
}

impl TaskRecord {
    pub(crate) fn pending(task_id: TaskId, estimated_time: f64) -> Self {
        let now = Utc::now();
        Self {
            task_id,
            status: TaskStatus::Pending,
            progress: 0.0,
            message: "Task submitted, waiting for a free device".to_string(),
            created_at: now,
            updated_at: now,
            estimated_time,
            result: None,
            error: None,
            resource_id: None,
        }
    }
}

/// Partial update applied by [`TaskStore::update`](super::TaskStore::update).
///
/// Only the fields that are set change; `status` is always written.
#[derive(Debug, Clone)]
pub struct TaskUpdate {
    pub status: TaskStatus,
    pub progress: Option<f64>,
    pub message: Option<String>,
    pub result: Option<ResultLocator>,
    pub error: Option<String>,
    pub resource_id: Option<ResourceId>,
}

impl TaskUpdate {
    pub fn new(status: TaskStatus) -> Self {
        Self {
            status,
            progress: None,
            message: None,
            result: None,
            error: None,
            resource_id: None,
        }
    }

    pub fn processing(progress: f64, message: impl Into<String>) -> Self {
        Self::new(TaskStatus::Processing)
            .progress(progress)
            .message(message)
    }

    pub fn progress(mut self, progress: f64) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn result(mut self, result: ResultLocator) -> Self {
        self.result = Some(result);
        self
    }

    pub fn error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    pub fn resource(mut self, resource_id: ResourceId) -> Self {
        self.resource_id = Some(resource_id);
        self
    }
}
