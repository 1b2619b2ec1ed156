// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Devices CLI subcommand: run discovery and print the resulting pool.

use crate::config::{self, EnvConfig};
use crate::resources::{default_probes, DiscoverySource, ResourceRegistry};

use super::config_cmd::EXIT_CONFIG_ERROR;

/// Run device discovery the way the runtime would at startup.
pub fn discover(env: &EnvConfig) -> ResourceRegistry {
    ResourceRegistry::discover(&default_probes(env.devices.clone()), &env.fallback_devices)
}

/// Run `devices`. Returns 0 on success, 2 on a configuration error.
pub fn run_devices(json: bool) -> i32 {
    let env = match config::load() {
        Ok(env) => env,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            return EXIT_CONFIG_ERROR;
        }
    };
    let registry = discover(&env);

    if json {
        let body = serde_json::json!({
            "source": source_label(registry.source()),
            "degraded": registry.is_degraded(),
            "devices": registry.resources(),
        });
        println!("{body}");
    } else {
        print_devices(&registry);
    }
    0
}

fn source_label(source: DiscoverySource) -> &'static str {
    match source {
        DiscoverySource::Probe(name) => name,
        DiscoverySource::Explicit => "explicit",
        DiscoverySource::Fallback => "fallback",
    }
}

pub fn print_devices(registry: &ResourceRegistry) {
    println!("{:<8} {:<10}", "DEVICE", "SOURCE");
    println!("{}", "-".repeat(19));
    let source = source_label(registry.source());
    for id in registry.resources() {
        println!("{:<8} {:<10}", id, source);
    }
    println!("{}", "-".repeat(19));
    println!("{} device(s)", registry.len());
    if registry.is_degraded() {
        println!("No devices detected; running on the fallback pool.");
    }
}
