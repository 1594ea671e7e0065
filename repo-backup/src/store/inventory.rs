//! Archive inventory and freshness check.
//!
//! The set of archives in a backup location is recomputed from the directory
//! listing on every call; nothing else is persisted.

use super::naming::{has_extension, mentions_change_point, parse_change_point};
use crate::Result;
use std::fs;
use std::path::Path;
use tracing::debug;

/// One stored archive, derived from its file name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveRecord {
    pub file_name: String,

    /// Parsed change-point; `None` when the last `-` token is not numeric
    pub change_point: Option<i64>,
}

/// Archives present in a backup location, in directory enumeration order.
#[derive(Debug, Clone, Default)]
pub struct Inventory {
    records: Vec<ArchiveRecord>,
}

impl Inventory {
    pub fn from_records(records: Vec<ArchiveRecord>) -> Self {
        Self { records }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[ArchiveRecord] {
        &self.records
    }

    /// The archive with the smallest parsed change-point. Records without one
    /// are never selected. Ties resolve to the first record in enumeration order.
    pub fn oldest(&self) -> Option<&ArchiveRecord> {
        self.records
            .iter()
            .filter_map(|r| r.change_point.map(|point| (point, r)))
            .min_by_key(|(point, _)| *point)
            .map(|(_, r)| r)
    }

    pub fn contains(&self, file_name: &str) -> bool {
        self.records.iter().any(|r| r.file_name == file_name)
    }
}

/// List the archives stored at `location`.
///
/// Every non-directory entry ending in `.<extension>` is an archive, symlinks
/// included. Entries whose name carries no numeric change-point are kept with
/// `change_point: None`.
pub fn list_archives(location: &Path, extension: &str) -> Result<Inventory> {
    let mut records = Vec::new();

    for entry in fs::read_dir(location)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().to_string();
        if !has_extension(&file_name, extension) {
            continue;
        }

        let change_point = parse_change_point(&file_name, extension);
        if change_point.is_none() {
            debug!(
                location = %location.display(),
                file = %file_name,
                "Archive name has no change-point"
            );
        }
        records.push(ArchiveRecord { file_name, change_point });
    }

    Ok(Inventory { records })
}

/// True if an archive for `change_point` already exists.
pub fn is_up_to_date(inventory: &Inventory, change_point: i64) -> bool {
    inventory
        .records
        .iter()
        .any(|r| mentions_change_point(&r.file_name, change_point))
}
