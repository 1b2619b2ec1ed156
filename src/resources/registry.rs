// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Resource registry: the fixed, ordered set of devices for this process.
//!
//! Discovery never fails. When no probe yields devices, the configured
//! fallback list is used, and if that is empty too, a single device `0`.

use std::collections::HashSet;

use super::probe::DeviceProbe;
use super::ResourceId;

/// Where the device set came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoverySource {
    /// A platform probe answered with at least one device.
    Probe(&'static str),
    /// Supplied directly by the embedder.
    Explicit,
    /// No probe answered; the configured fallback list was used.
    Fallback,
}

/// Ordered, immutable set of resource ids.
#[derive(Debug, Clone)]
pub struct ResourceRegistry {
    resources: Vec<ResourceId>,
    source: DiscoverySource,
}

impl ResourceRegistry {
    /// Probe in order; the first non-empty answer wins.
    pub fn discover(probes: &[Box<dyn DeviceProbe>], fallback: &[ResourceId]) -> Self {
        for probe in probes {
            match probe.probe() {
                Ok(ids) if !ids.is_empty() => {
                    let registry = Self::from_parts(ids, DiscoverySource::Probe(probe.name()));
                    tracing::info!(
                        probe = probe.name(),
                        devices = ?registry.resources,
                        "discovered compute resources"
                    );
                    return registry;
                }
                Ok(_) => {
                    tracing::debug!(probe = probe.name(), "probe found no devices");
                }
                Err(e) => {
                    tracing::warn!(probe = probe.name(), error = %e, "device probe failed");
                }
            }
        }

        let registry = Self::from_parts(fallback.to_vec(), DiscoverySource::Fallback);
        tracing::warn!(
            devices = ?registry.resources,
            "could not detect devices, using fallback pool"
        );
        registry
    }

    /// Build from an explicit list. Order is kept, repeats are dropped.
    pub fn from_ids(ids: impl IntoIterator<Item = ResourceId>) -> Self {
        Self::from_parts(ids.into_iter().collect(), DiscoverySource::Explicit)
    }

    fn from_parts(ids: Vec<ResourceId>, source: DiscoverySource) -> Self {
        let mut seen = HashSet::with_capacity(ids.len());
        let mut resources: Vec<ResourceId> =
            ids.into_iter().filter(|id| seen.insert(*id)).collect();
        if resources.is_empty() {
            resources.push(ResourceId::new(0));
        }
        Self { resources, source }
    }

    pub fn resources(&self) -> &[ResourceId] {
        &self.resources
    }

    /// First listed resource; the default for inline execution.
    pub fn primary(&self) -> ResourceId {
        self.resources[0]
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.resources.contains(&id)
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    /// Always false: the pool has at least one resource.
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn source(&self) -> DiscoverySource {
        self.source
    }

    /// True when running on the fallback pool instead of probed devices.
    pub fn is_degraded(&self) -> bool {
        self.source == DiscoverySource::Fallback
    }
}
