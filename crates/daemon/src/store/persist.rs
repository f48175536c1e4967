// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store persistence: load/save JSON snapshots with atomic writes.

use std::path::{Path, PathBuf};

use crate::store::StoreSnapshot;

/// Load a store snapshot from a JSON file.
pub fn load(path: &Path) -> anyhow::Result<StoreSnapshot> {
    let contents = std::fs::read_to_string(path)?;
    let snapshot: StoreSnapshot = serde_json::from_str(&contents)?;
    Ok(snapshot)
}

/// Save a store snapshot to a JSON file atomically (write tmp + rename).
pub fn save(path: &Path, snapshot: &StoreSnapshot) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
        }
    }
    let json = serde_json::to_string_pretty(snapshot)?;
    let tmp_path = path.with_extension("tmp");
    std::fs::write(&tmp_path, json)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

/// Resolve the daemon state directory.
///
/// Checks `MOTIFD_STATE_DIR`, then `$XDG_STATE_HOME/motif`, then
/// `$HOME/.local/state/motif`.
pub fn state_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("MOTIFD_STATE_DIR") {
        return PathBuf::from(dir);
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("motif");
    }
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".local/state/motif");
    }
    PathBuf::from(".motif")
}

#[cfg(test)]
#[path = "persist_tests.rs"]
mod tests;
