// Copyright 2024-2026 vox-runtime Contributors
// SPDX-License-Identifier: Apache-2.0

//! Adapters CLI subcommand: list the checkpoints in the adapter directory.

use std::path::Path;

use crate::adapters::{ConfigKey, ConfigurationCatalog, DirectoryCatalog};

/// Run `adapters`, scanning `root`.
///
/// Returns exit code: 0 on success, 1 if the directory cannot be read.
pub async fn run_list(root: &Path) -> i32 {
    let catalog = DirectoryCatalog::new(root);
    match catalog.list().await {
        Ok(keys) => {
            print_adapters(root, &keys);
            0
        }
        Err(e) => {
            eprintln!("Failed to read adapter directory {}: {}", root.display(), e);
            1
        }
    }
}

/// Print adapter keys, newest first, to stdout.
pub fn print_adapters(root: &Path, keys: &[ConfigKey]) {
    println!("Adapter directory: {}", root.display());
    if keys.is_empty() {
        println!("No adapters found. Only the base model ({}) is available.", ConfigKey::base());
        return;
    }

    println!("{:<60}", "ADAPTER");
    println!("{}", "-".repeat(60));
    for key in keys {
        println!("{:<60}", truncate(key.as_str(), 59));
    }
    println!("{}", "-".repeat(60));
    println!("{} adapter(s)", keys.len());
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
