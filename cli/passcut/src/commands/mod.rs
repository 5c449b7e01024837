//! CLI command implementations.

pub mod partition;
pub mod target;

use std::path::Path;

use anyhow::{Context, Result};
use passcut_targets::TargetRegistry;

/// Built-in profiles plus any found in `targets_dir`, or in `./targets` when
/// no directory is given and it exists.
pub fn load_registry(cwd: &Path, targets_dir: Option<&Path>) -> Result<TargetRegistry> {
    let mut registry = TargetRegistry::with_builtins();
    let dir = match targets_dir {
        Some(dir) => Some(dir.to_path_buf()),
        None => Some(cwd.join("targets")).filter(|d| d.is_dir()),
    };
    if let Some(dir) = dir {
        let loaded = registry
            .load_dir(&dir)
            .with_context(|| format!("failed to load target profiles from {}", dir.display()))?;
        tracing::debug!(dir = %dir.display(), loaded, "loaded target profiles");
    }
    Ok(registry)
}
