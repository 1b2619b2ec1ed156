// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! vox-runtime entry point.
//!
//! Operator commands for inspecting what the scheduler would run with:
//! the discovered device pool, the adapter catalog and the effective
//! configuration. Embedding services link the library and call
//! `Runtime::start` with their own engine.
//!
//! ## CLI Subcommands
//!
//! - `vox-runtime-cli devices` - Discover devices (exit 0/2)
//! - `vox-runtime-cli adapters` - List adapter checkpoints (exit 0/1/2)
//! - `vox-runtime-cli config show|defaults|validate` - Inspect configuration

use std::process::ExitCode;

use vox_runtime::cli::{adapters_cmd, config_cmd, devices_cmd, EXIT_CONFIG_ERROR};
use vox_runtime::config;
use vox_runtime::telemetry::init_logging;

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(|s| s.as_str()).unwrap_or("help");
    let json_output = args.iter().skip(2).any(|a| a == "--json");

    match command {
        "devices" => {
            init_cli_logging();
            let code = devices_cmd::run_devices(json_output);
            ExitCode::from(code as u8)
        }
        "adapters" => {
            let env = match config::load() {
                Ok(env) => env,
                Err(e) => {
                    eprintln!("Configuration error: {}", e);
                    return ExitCode::from(EXIT_CONFIG_ERROR as u8);
                }
            };
            init_cli_logging();
            let code = adapters_cmd::run_list(&env.adapter_dir).await;
            ExitCode::from(code as u8)
        }
        "config" => {
            let subcommand = args.get(2).map(|s| s.as_str()).unwrap_or("show");
            match subcommand {
                "show" | "--json" => ExitCode::from(config_cmd::run_show(json_output) as u8),
                "defaults" => {
                    config_cmd::run_defaults();
                    ExitCode::SUCCESS
                }
                "validate" => ExitCode::from(config_cmd::run_validate() as u8),
                _ => {
                    eprintln!("Unknown config subcommand: {}", subcommand);
                    print_command_help("config");
                    ExitCode::FAILURE
                }
            }
        }
        "help" | "--help" | "-h" => {
            if let Some(subcommand) = args.get(2) {
                print_command_help(subcommand);
            } else {
                print_usage();
            }
            ExitCode::SUCCESS
        }
        "version" | "--version" | "-V" => {
            println!("vox-runtime {}", env!("CARGO_PKG_VERSION"));
            ExitCode::SUCCESS
        }
        _ => {
            eprintln!("Unknown command: {}", command);
            print_usage();
            ExitCode::FAILURE
        }
    }
}

/// Route probe and catalog warnings to stderr using the configured filter.
fn init_cli_logging() {
    let log = match config::load() {
        Ok(env) => env.log,
        Err(_) => return,
    };
    if let Err(e) = init_logging(&log) {
        eprintln!("Logging disabled: {}", e);
    }
}

fn print_usage() {
    let version = env!("CARGO_PKG_VERSION");
    eprintln!(
        "vox-runtime - multi-device speech synthesis scheduler v{}

USAGE:
    vox-runtime-cli [COMMAND] [OPTIONS]

COMMANDS:
    devices      Discover compute devices and print the pool
    adapters     List adapter checkpoints in VOX_ADAPTER_DIR
    config       Inspect configuration (show, defaults, validate)
    version      Show version information
    help         Show this help message

OPTIONS:
    -h, --help     Show help for command
    -V, --version  Show version information
    --json         JSON output (devices, config show)

ENVIRONMENT:
    VOX_CONFIG            Optional TOML config file
    VOX_DEVICES           Explicit device list, e.g. 0,1,3
    VOX_FALLBACK_DEVICES  Pool used when no device is detected (default: 0,1)
    VOX_ADAPTER_DIR       Adapter checkpoint root (default: lora)
    VOX_OUTPUT_DIR        Audio output directory (default: api_outputs)
    VOX_LOG_LEVEL         Log filter (default: info)

EXIT CODES:
    0  Success
    1  Failure
    2  Configuration error
",
        version
    );
}

/// Print detailed help for a specific command.
fn print_command_help(command: &str) {
    match command {
        "devices" => {
            eprintln!(
                "vox-runtime-cli devices - Discover compute devices

USAGE:
    vox-runtime-cli devices [--json]

DESCRIPTION:
    Runs the same discovery the scheduler performs at startup: the
    explicit VOX_DEVICES list, then CUDA (when built with the `cuda`
    feature), then `rocm-smi --showid`. When nothing answers, the
    VOX_FALLBACK_DEVICES pool is used and reported as degraded.

EXIT CODES:
    0  Discovery completed
    2  Configuration error
"
            );
        }
        "adapters" => {
            eprintln!(
                "vox-runtime-cli adapters - List adapter checkpoints

USAGE:
    vox-runtime-cli adapters

DESCRIPTION:
    Lists every directory under VOX_ADAPTER_DIR that contains
    lora_weights.safetensors, newest name first. The base model is
    always available as `none`.

EXIT CODES:
    0  Listed successfully
    1  Directory could not be read
    2  Configuration error
"
            );
        }
        "config" => {
            eprintln!(
                "vox-runtime-cli config - Inspect configuration

USAGE:
    vox-runtime-cli config <SUBCOMMAND>

SUBCOMMANDS:
    show [--json]  Print effective configuration (default)
    defaults       Print default values
    validate       Check for misconfigurations

EXIT CODES:
    0  Success / valid
    1  Warnings found
    2  Configuration could not be loaded
"
            );
        }
        _ => {
            eprintln!("No detailed help for '{}'.", command);
            print_usage();
        }
    }
}
