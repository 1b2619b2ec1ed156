//! Instrumented collaborators shared by the integration tests.
//!
//! The engine counts how many calls are inside `load`/`run` per resource
//! at once, so tests can assert that a resource is never used by two
//! tasks simultaneously.

#![allow(dead_code)]

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use vox_runtime::adapters::{ConfigKey, ConfigurationDescriptor, StaticCatalog};
use vox_runtime::engine::{
    ArtifactError, ArtifactWriter, InferenceEngine, InferenceError, LoadError, LoadedModel,
    RawAudio, StateRef,
};
use vox_runtime::resources::{ResourceId, ResourceRegistry};
use vox_runtime::scheduler::SubmissionGateway;
use vox_runtime::tasks::{ResultLocator, TaskId, TaskRecord};
use vox_runtime::{Collaborators, Runtime, RuntimeConfig};

/// Adapter key whose load always fails.
pub const BROKEN_ADAPTER: &str = "broken";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Load { resource: ResourceId, adapter: String },
    RunStart { resource: ResourceId, text: String },
    RunEnd { resource: ResourceId, text: String },
    Persist { task_id: TaskId },
}

/// Call counters and the event timeline.
#[derive(Default)]
pub struct EngineStats {
    active: Mutex<HashMap<ResourceId, usize>>,
    max_active: AtomicUsize,
    loads: AtomicUsize,
    runs: AtomicUsize,
    events: Mutex<Vec<Event>>,
}

impl EngineStats {
    /// Highest number of simultaneous calls seen on any single resource.
    pub fn max_concurrent_per_resource(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    pub fn push(&self, event: Event) {
        self.events.lock().push(event);
    }

    fn enter(self: &Arc<Self>, resource: ResourceId) -> ActiveGuard {
        let mut active = self.active.lock();
        let count = active.entry(resource).or_insert(0);
        *count += 1;
        self.max_active.fetch_max(*count, Ordering::SeqCst);
        ActiveGuard {
            stats: Arc::clone(self),
            resource,
        }
    }
}

/// Leaves the active set on drop, including during a panic unwind.
struct ActiveGuard {
    stats: Arc<EngineStats>,
    resource: ResourceId,
}

impl Drop for ActiveGuard {
    fn drop(&mut self) {
        if let Some(count) = self.stats.active.lock().get_mut(&self.resource) {
            *count -= 1;
        }
    }
}

pub struct MockState {
    pub resource: ResourceId,
    pub key: ConfigKey,
}

impl LoadedModel for MockState {
    fn adapter(&self) -> &ConfigKey {
        &self.key
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Succeeds unless the text is `"fail"` (error) or `"panic"` (panics);
/// loading [`BROKEN_ADAPTER`] fails.
pub struct MockEngine {
    pub stats: Arc<EngineStats>,
    pub run_delay: Duration,
    pub load_delay: Duration,
}

impl MockEngine {
    pub fn new(run_delay: Duration) -> Self {
        Self {
            stats: Arc::new(EngineStats::default()),
            run_delay,
            load_delay: Duration::ZERO,
        }
    }
}

impl InferenceEngine for MockEngine {
    fn load(
        &self,
        resource: ResourceId,
        descriptor: &ConfigurationDescriptor,
    ) -> Result<StateRef, LoadError> {
        let _active = self.stats.enter(resource);
        std::thread::sleep(self.load_delay);
        if descriptor.key.as_str() == BROKEN_ADAPTER {
            return Err(LoadError::Failed {
                resource,
                reason: "checkpoint is corrupt".into(),
            });
        }
        self.stats.loads.fetch_add(1, Ordering::SeqCst);
        self.stats.push(Event::Load {
            resource,
            adapter: descriptor.key.to_string(),
        });
        Ok(Arc::new(MockState {
            resource,
            key: descriptor.key.clone(),
        }))
    }

    fn run(
        &self,
        state: &StateRef,
        payload: &vox_runtime::tasks::TaskPayload,
    ) -> Result<RawAudio, InferenceError> {
        let resource = state
            .as_any()
            .downcast_ref::<MockState>()
            .map(|s| s.resource)
            .ok_or_else(|| InferenceError::ModelError("foreign state".into()))?;
        let _active = self.stats.enter(resource);
        self.stats.runs.fetch_add(1, Ordering::SeqCst);
        self.stats.push(Event::RunStart {
            resource,
            text: payload.text.clone(),
        });
        std::thread::sleep(self.run_delay);

        let result = match payload.text.as_str() {
            "fail" => Err(InferenceError::ModelError("synthetic failure".into())),
            "panic" => panic!("engine exploded"),
            _ => Ok(RawAudio::new(vec![0.25; 160], 16_000)),
        };
        self.stats.push(Event::RunEnd {
            resource,
            text: payload.text.clone(),
        });
        result
    }
}

/// Writer that records persist calls and returns a fake path.
pub struct MemoryWriter {
    pub stats: Arc<EngineStats>,
}

impl ArtifactWriter for MemoryWriter {
    fn persist(&self, task_id: &TaskId, _audio: RawAudio) -> Result<ResultLocator, ArtifactError> {
        self.stats.push(Event::Persist {
            task_id: task_id.clone(),
        });
        Ok(ResultLocator::new(format!("mem/{task_id}.wav")))
    }
}

pub fn catalog() -> StaticCatalog {
    StaticCatalog::new()
        .with_adapter("speaker_a")
        .with_adapter("speaker_b")
        .with_adapter(BROKEN_ADAPTER)
}

pub fn fast_config() -> RuntimeConfig {
    RuntimeConfig {
        poll_timeout: Duration::from_millis(20),
        list_limit: 50,
        shutdown_timeout: Duration::from_secs(5),
    }
}

pub fn ids(resources: &[u32]) -> Vec<ResourceId> {
    resources.iter().copied().map(ResourceId::new).collect()
}

/// Start a runtime on `resources` with a mock engine; returns the stats.
pub fn start(resources: &[u32], run_delay: Duration) -> (Runtime, Arc<EngineStats>) {
    let engine = MockEngine::new(run_delay);
    let stats = Arc::clone(&engine.stats);
    let runtime = Runtime::start(
        ResourceRegistry::from_ids(ids(resources)),
        fast_config(),
        Collaborators {
            catalog: Arc::new(catalog()),
            engine: Arc::new(engine),
            writer: Arc::new(MemoryWriter {
                stats: Arc::clone(&stats),
            }),
        },
    );
    (runtime, stats)
}

/// Poll until the task reaches a terminal status.
pub async fn wait_terminal(gateway: &SubmissionGateway, task_id: &TaskId) -> TaskRecord {
    tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            if let Some(record) = gateway.get_status(task_id) {
                if record.status.is_terminal() {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("task reached a terminal status")
}
