// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Exclusive compute resources (accelerator devices).
//!
//! Discovery runs once at startup; the per-device state cache owns the
//! loaded model for each device and its exclusive lock.

mod cache;
mod probe;
mod registry;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub use cache::{CacheError, ResourceGuard, ResourceState, ResourceStateCache};
pub use probe::{
    default_probes, parse_device_list, parse_rocm_showid, CudaProbe, DeviceProbe, ListProbe,
    ProbeError, RocmProbe,
};
pub use registry::{DiscoverySource, ResourceRegistry};

/// Identity of one physical compute resource, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceId(u32);

impl ResourceId {
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ResourceId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<u32>().map(Self)
    }
}

impl From<u32> for ResourceId {
    fn from(value: u32) -> Self {
        Self(value)
    }
}
