// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Config CLI subcommands: show, defaults, validate.
//!
//! These commands read configuration from the environment (and the
//! optional `VOX_CONFIG` file) without starting any workers.

use tracing_subscriber::EnvFilter;

use crate::config::{self, EffectiveConfig, EnvConfig};
use crate::resources::parse_device_list;

/// Exit code for an unreadable configuration.
pub const EXIT_CONFIG_ERROR: i32 = 2;

fn load_or_report() -> Result<EnvConfig, i32> {
    config::load().map_err(|e| {
        eprintln!("Configuration error: {e}");
        EXIT_CONFIG_ERROR
    })
}

/// Print effective config as key-value pairs, or JSON with `json`.
pub fn run_show(json: bool) -> i32 {
    let cfg = match load_or_report() {
        Ok(env) => env.effective_config(),
        Err(code) => return code,
    };
    if json {
        match serde_json::to_string_pretty(&cfg) {
            Ok(out) => println!("{out}"),
            Err(e) => {
                eprintln!("Failed to encode configuration: {e}");
                return 1;
            }
        }
    } else {
        print_config(&cfg);
    }
    0
}

/// Print default config values (no env overrides) to stdout.
pub fn run_defaults() {
    println!("VOX_CONFIG=");
    println!("VOX_DEVICES=");
    println!("VOX_FALLBACK_DEVICES=0,1");
    println!("VOX_POLL_TIMEOUT_MS=2000");
    println!("VOX_SHUTDOWN_TIMEOUT=30");
    println!("VOX_LIST_LIMIT=50");
    println!("VOX_ADAPTER_DIR=lora");
    println!("VOX_OUTPUT_DIR=api_outputs");
    println!("VOX_LOG_FORMAT=json");
    println!("VOX_LOG_LEVEL=info");
}

/// Validate configuration for obvious misconfigurations.
///
/// Returns 0 if valid, 1 if any warnings are found, 2 if the
/// configuration could not be loaded at all.
pub fn run_validate() -> i32 {
    let env = match load_or_report() {
        Ok(env) => env,
        Err(code) => return code,
    };
    let warnings = collect_warnings(&env);
    for warning in &warnings {
        eprintln!("WARNING: {warning}");
    }

    if warnings.is_empty() {
        println!("Configuration is valid.");
        0
    } else {
        1
    }
}

fn collect_warnings(env: &EnvConfig) -> Vec<String> {
    let mut warnings = Vec::new();

    if let Some(raw) = &env.devices {
        match parse_device_list(raw) {
            Ok(ids) if ids.is_empty() => {
                warnings.push("VOX_DEVICES is empty; devices will be probed".to_string())
            }
            Ok(_) => {}
            Err(e) => warnings.push(format!("VOX_DEVICES: {e}; devices will be probed")),
        }
    }

    if !env.adapter_dir.is_dir() {
        warnings.push(format!(
            "VOX_ADAPTER_DIR ({}) does not exist; only the base model is available",
            env.adapter_dir.display()
        ));
    }

    if env.output_dir.exists() && !env.output_dir.is_dir() {
        warnings.push(format!(
            "VOX_OUTPUT_DIR ({}) is not a directory",
            env.output_dir.display()
        ));
    }

    if EnvFilter::try_new(&env.log.level).is_err() {
        warnings.push(format!("VOX_LOG_LEVEL ({}) is not a valid filter", env.log.level));
    }

    warnings
}

fn print_config(cfg: &EffectiveConfig) {
    let file = cfg
        .config_file
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    let fallback = cfg
        .fallback_devices
        .iter()
        .map(|id| id.to_string())
        .collect::<Vec<_>>()
        .join(",");

    println!("VOX_CONFIG={file}");
    println!("VOX_DEVICES={}", cfg.devices.as_deref().unwrap_or(""));
    println!("VOX_FALLBACK_DEVICES={fallback}");
    println!("VOX_POLL_TIMEOUT_MS={}", cfg.poll_timeout_ms);
    println!("VOX_SHUTDOWN_TIMEOUT={}", cfg.shutdown_timeout_secs);
    println!("VOX_LIST_LIMIT={}", cfg.list_limit);
    println!("VOX_ADAPTER_DIR={}", cfg.adapter_dir.display());
    println!("VOX_OUTPUT_DIR={}", cfg.output_dir.display());
    println!("VOX_LOG_FORMAT={}", cfg.log_format.as_str());
    println!("VOX_LOG_LEVEL={}", cfg.log_level);
}
