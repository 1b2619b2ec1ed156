// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Adapter configurations the runtime can bind to a device.
//!
//! Handles configuration keys, checkpoint settings, and the catalog used
//! for submit-time validation and load-time resolution.

mod catalog;
mod settings;

pub use catalog::{
    CatalogError, ConfigurationCatalog, ConfigurationDescriptor, DirectoryCatalog,
    StaticCatalog, SETTINGS_FILE, WEIGHTS_FILE,
};
pub use settings::{AdapterSettings, ConfigKey};
