// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution.

use std::path::{Path, PathBuf};

use sharespool_core::error::Result;

/// Return the application data directory, creating it if needed.
///
/// An explicit directory (`--data-dir` / `SHARESPOOL_DATA_DIR`) wins;
/// otherwise the XDG data home is used.
pub fn data_dir(explicit: Option<&Path>) -> Result<PathBuf> {
    let dir = resolve(
        explicit,
        std::env::var_os("XDG_DATA_HOME").map(PathBuf::from),
        std::env::var_os("HOME").map(PathBuf::from),
    );
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

fn resolve(explicit: Option<&Path>, xdg_data_home: Option<PathBuf>, home: Option<PathBuf>) -> PathBuf {
    if let Some(dir) = explicit {
        return dir.to_path_buf();
    }
    // Try XDG data dir, then fallback to home
    let base = xdg_data_home
        .filter(|p| p.is_absolute())
        .or_else(|| home.map(|h| h.join(".local").join("share")))
        // Last resort
        .unwrap_or_else(std::env::temp_dir);
    base.join("sharespool")
}
