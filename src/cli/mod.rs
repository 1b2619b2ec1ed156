// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI subcommands for the vox-runtime binary.
//!
//! Every command reads configuration from the environment and runs
//! in-process; none of them need a running scheduler.
//!
//! ## Usage
//!
//! ```bash
//! vox-runtime devices          # Discover devices and print the pool
//! vox-runtime adapters         # List adapter checkpoints
//! vox-runtime config show      # Print effective configuration
//! ```

pub mod adapters_cmd;
pub mod config_cmd;
pub mod devices_cmd;

pub use config_cmd::EXIT_CONFIG_ERROR;
pub use devices_cmd::discover;
