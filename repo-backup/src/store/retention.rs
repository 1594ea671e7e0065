//! Retention pruning.

use super::inventory::Inventory;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

/// Delete the oldest pre-existing archive if the location now holds more than
/// `max_count` archives.
///
/// `inventory` must describe the location *before* the archive that was just
/// installed, so the current count is `inventory.len() + 1`. At most one file
/// is removed per call. Archives without a parsed change-point count toward
/// the limit but are never chosen. Deletion failures are logged, not returned;
/// the pruned path is returned for reporting only.
pub fn prune_if_needed(location: &Path, inventory: &Inventory, max_count: usize) -> Option<PathBuf> {
    let count = inventory.len() + 1;
    if count <= max_count {
        return None;
    }

    let oldest = inventory.oldest()?;
    let prune_path = location.join(&oldest.file_name);
    info!(location = %location.display(), count, max_count, "Pruning backups");

    match fs::remove_file(&prune_path) {
        Ok(()) => {
            info!(path = %prune_path.display(), "Pruned backup");
            Some(prune_path)
        }
        Err(e) => {
            error!(path = %prune_path.display(), error = %e, "Failed to prune backup");
            None
        }
    }
}
