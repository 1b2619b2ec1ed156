// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Per-resource state cache and exclusive locks.
//!
//! Each resource owns one slot: an async mutex around the loaded model
//! state. Every load, swap, inference and release for a resource happens
//! while its [`ResourceGuard`] is alive, so at most one task uses a device
//! at a time and a swap can never interleave with a running inference.
//!
//! Read-only observers (health, listings) use a lock-free mirror of the
//! loaded key and never wait on a busy device.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::ResourceId;
use crate::adapters::{ConfigKey, ConfigurationCatalog};
use crate::engine::{InferenceEngine, LoadError, StateRef};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CacheError {
    #[error("Unknown resource: {0}")]
    UnknownResource(ResourceId),
}

struct LoadedState {
    key: ConfigKey,
    handle: StateRef,
}

#[derive(Default)]
struct SlotStats {
    loaded_key: RwLock<Option<ConfigKey>>,
    loads: AtomicU64,
    acquisitions: AtomicU64,
}

struct Slot {
    state: Arc<Mutex<Option<LoadedState>>>,
    stats: Arc<SlotStats>,
}

/// Point-in-time view of one resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceState {
    pub resource_id: ResourceId,
    /// Configuration currently bound, if any.
    pub loaded_adapter: Option<ConfigKey>,
    /// True while some task holds the resource lock.
    pub busy: bool,
}

/// Owns the loaded state and the exclusive lock of every resource.
pub struct ResourceStateCache {
    slots: HashMap<ResourceId, Slot>,
    order: Vec<ResourceId>,
}

impl ResourceStateCache {
    /// One empty slot per resource. The set is fixed for the cache lifetime.
    pub fn new(resources: &[ResourceId]) -> Self {
        let mut slots = HashMap::with_capacity(resources.len());
        let mut order = Vec::with_capacity(resources.len());
        for &id in resources {
            if slots.contains_key(&id) {
                continue;
            }
            slots.insert(
                id,
                Slot {
                    state: Arc::new(Mutex::new(None)),
                    stats: Arc::new(SlotStats::default()),
                },
            );
            order.push(id);
        }
        Self { slots, order }
    }

    fn slot(&self, id: ResourceId) -> Result<&Slot, CacheError> {
        self.slots.get(&id).ok_or(CacheError::UnknownResource(id))
    }

    /// Acquire the exclusive lock of `id`, waiting while it is held.
    pub async fn lock(&self, id: ResourceId) -> Result<ResourceGuard, CacheError> {
        let slot = self.slot(id)?;
        let state = Arc::clone(&slot.state).lock_owned().await;
        slot.stats.acquisitions.fetch_add(1, Ordering::Relaxed);
        Ok(ResourceGuard {
            resource_id: id,
            state,
            stats: Arc::clone(&slot.stats),
        })
    }

    /// Configuration last bound on `id`, without taking the lock.
    pub fn loaded_key(&self, id: ResourceId) -> Option<ConfigKey> {
        self.slots
            .get(&id)
            .and_then(|slot| slot.stats.loaded_key.read().clone())
    }

    /// Number of successful loads on `id` since startup.
    pub fn load_count(&self, id: ResourceId) -> u64 {
        self.slots
            .get(&id)
            .map_or(0, |slot| slot.stats.loads.load(Ordering::Relaxed))
    }

    /// Number of times the lock of `id` was granted.
    pub fn acquisitions(&self, id: ResourceId) -> u64 {
        self.slots
            .get(&id)
            .map_or(0, |slot| slot.stats.acquisitions.load(Ordering::Relaxed))
    }

    /// State of every resource, in registry order.
    pub fn snapshot(&self) -> Vec<ResourceState> {
        self.order
            .iter()
            .filter_map(|id| {
                let slot = self.slots.get(id)?;
                Some(ResourceState {
                    resource_id: *id,
                    loaded_adapter: slot.stats.loaded_key.read().clone(),
                    busy: slot.state.try_lock().is_err(),
                })
            })
            .collect()
    }

    pub fn resources(&self) -> &[ResourceId] {
        &self.order
    }
}

/// Exclusive access to one resource and its loaded state.
///
/// Dropping the guard releases the resource.
pub struct ResourceGuard {
    resource_id: ResourceId,
    state: OwnedMutexGuard<Option<LoadedState>>,
    stats: Arc<SlotStats>,
}

impl ResourceGuard {
    pub fn resource_id(&self) -> ResourceId {
        self.resource_id
    }

    /// Configuration currently bound, if any.
    pub fn current_key(&self) -> Option<&ConfigKey> {
        (*self.state).as_ref().map(|loaded| &loaded.key)
    }

    /// Make sure `key` is bound on this resource and return its state.
    ///
    /// A matching configuration is reused as-is. Otherwise the previous
    /// state is released first and the new one is loaded. If the load
    /// fails the resource is left empty, so the next task starts clean.
    pub async fn ensure_loaded(
        &mut self,
        key: &ConfigKey,
        catalog: &dyn ConfigurationCatalog,
        engine: &Arc<dyn InferenceEngine>,
    ) -> Result<StateRef, LoadError> {
        if let Some(loaded) = &*self.state {
            if &loaded.key == key {
                return Ok(Arc::clone(&loaded.handle));
            }
        }

        self.unload();

        let descriptor = catalog.resolve(key).await?;
        let resource = self.resource_id;
        let engine = Arc::clone(engine);
        let started = Instant::now();
        let handle = tokio::task::spawn_blocking(move || engine.load(resource, &descriptor))
            .await
            .map_err(|e| LoadError::Panicked(e.to_string()))??;

        self.stats.loads.fetch_add(1, Ordering::Relaxed);
        *self.stats.loaded_key.write() = Some(key.clone());
        *self.state = Some(LoadedState {
            key: key.clone(),
            handle: Arc::clone(&handle),
        });

        crate::telemetry::record_adapter_load(resource);
        tracing::info!(
            resource = %resource,
            adapter = %key,
            load_ms = started.elapsed().as_millis() as u64,
            "adapter loaded"
        );
        Ok(handle)
    }

    /// Release whatever is bound on this resource.
    pub fn unload(&mut self) {
        if let Some(previous) = self.state.take() {
            *self.stats.loaded_key.write() = None;
            tracing::debug!(
                resource = %self.resource_id,
                adapter = %previous.key,
                "released loaded state"
            );
        }
    }
}
