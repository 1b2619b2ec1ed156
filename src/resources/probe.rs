// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Platform probes that enumerate accelerator devices.
//!
//! Each probe either yields device ids or explains why it could not.
//! Probes never panic; the registry decides what to do on failure.

use std::process::Command;

use thiserror::Error;

use super::ResourceId;

#[derive(Error, Debug)]
pub enum ProbeError {
    #[error("{probe} probe unavailable: {reason}")]
    Unavailable { probe: &'static str, reason: String },

    #[error("{probe} probe failed: {reason}")]
    Failed { probe: &'static str, reason: String },

    #[error("Invalid device list: {0}")]
    InvalidList(String),
}

/// Source of device ids.
pub trait DeviceProbe: Send + Sync {
    fn name(&self) -> &'static str;

    fn probe(&self) -> Result<Vec<ResourceId>, ProbeError>;
}

/// Parse a comma/whitespace separated list such as `"0, 1,3"`.
pub fn parse_device_list(raw: &str) -> Result<Vec<ResourceId>, ProbeError> {
    raw.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<ResourceId>()
                .map_err(|_| ProbeError::InvalidList(raw.to_string()))
        })
        .collect()
}

/// Explicitly configured device list (operator override).
pub struct ListProbe {
    raw: Option<String>,
}

impl ListProbe {
    pub fn new(raw: Option<String>) -> Self {
        Self { raw }
    }
}

impl DeviceProbe for ListProbe {
    fn name(&self) -> &'static str {
        "list"
    }

    fn probe(&self) -> Result<Vec<ResourceId>, ProbeError> {
        match &self.raw {
            Some(raw) => parse_device_list(raw),
            None => Err(ProbeError::Unavailable {
                probe: self.name(),
                reason: "no device list configured".into(),
            }),
        }
    }
}

/// NVIDIA devices via the CUDA driver API.
pub struct CudaProbe;

impl DeviceProbe for CudaProbe {
    fn name(&self) -> &'static str {
        "cuda"
    }

    #[cfg(feature = "cuda")]
    fn probe(&self) -> Result<Vec<ResourceId>, ProbeError> {
        use cudarc::driver::{result, CudaDevice};

        let failed = |e: result::DriverError| ProbeError::Failed {
            probe: "cuda",
            reason: e.to_string(),
        };
        result::init().map_err(failed)?;
        let count = CudaDevice::count().map_err(failed)?;
        let count = u32::try_from(count).unwrap_or(0);
        Ok((0..count).map(ResourceId::new).collect())
    }

    #[cfg(not(feature = "cuda"))]
    fn probe(&self) -> Result<Vec<ResourceId>, ProbeError> {
        Err(ProbeError::Unavailable {
            probe: self.name(),
            reason: "built without the `cuda` feature".into(),
        })
    }
}

/// AMD devices via `rocm-smi --showid`.
pub struct RocmProbe {
    program: String,
}

impl RocmProbe {
    pub fn new() -> Self {
        Self { program: "rocm-smi".to_string() }
    }

    /// Use a different executable (tests, non-standard installs).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self { program: program.into() }
    }
}

impl Default for RocmProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl DeviceProbe for RocmProbe {
    fn name(&self) -> &'static str {
        "rocm"
    }

    fn probe(&self) -> Result<Vec<ResourceId>, ProbeError> {
        let output = Command::new(&self.program)
            .arg("--showid")
            .output()
            .map_err(|e| ProbeError::Unavailable {
                probe: self.name(),
                reason: e.to_string(),
            })?;

        if !output.status.success() {
            return Err(ProbeError::Failed {
                probe: self.name(),
                reason: format!("exited with {}", output.status),
            });
        }

        Ok(parse_rocm_showid(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Probes in discovery order: explicit list, CUDA, then ROCm.
pub fn default_probes(explicit: Option<String>) -> Vec<Box<dyn DeviceProbe>> {
    vec![
        Box::new(ListProbe::new(explicit)),
        Box::new(CudaProbe),
        Box::new(RocmProbe::new()),
    ]
}

/// Extract device indices from `rocm-smi --showid` output.
///
/// Recognises the `GPU[n]` prefix; otherwise takes the first purely
/// numeric token on a line mentioning both `GPU` and `Device`.
pub fn parse_rocm_showid(stdout: &str) -> Vec<ResourceId> {
    let mut ids = Vec::new();
    for line in stdout.lines() {
        if !(line.contains("GPU") && line.contains("Device")) {
            continue;
        }
        if let Some(id) = bracketed_index(line) {
            ids.push(id);
            continue;
        }
        if let Some(id) = line
            .split_whitespace()
            .find(|tok| tok.chars().all(|c| c.is_ascii_digit()))
            .and_then(|tok| tok.parse().ok())
        {
            ids.push(id);
        }
    }
    ids
}

fn bracketed_index(line: &str) -> Option<ResourceId> {
    let start = line.find("GPU[")? + "GPU[".len();
    let end = line[start..].find(']')? + start;
    line[start..end].parse().ok()
}
