//! Repository descriptors and discovery.

pub mod github;

use crate::{BackupError, Result};
use chrono::{DateTime, Utc};

/// A remotely hosted repository as seen by one backup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryDescriptor {
    /// Owning account or organisation login
    pub owner: String,

    /// Short repository name
    pub name: String,

    /// Transport URL used for the mirror clone (without credentials)
    pub clone_url: String,

    /// Time of the last change to the repository
    pub last_change: DateTime<Utc>,
}

impl RepositoryDescriptor {
    /// Build a descriptor, rejecting names that are not a single path component.
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        clone_url: impl Into<String>,
        last_change: DateTime<Utc>,
    ) -> Result<Self> {
        let owner = owner.into();
        let name = name.into();
        for part in [&owner, &name] {
            if !is_path_component(part) {
                return Err(BackupError::Discovery(format!(
                    "invalid repository name component: {part:?}"
                )));
            }
        }
        Ok(Self {
            owner,
            name,
            clone_url: clone_url.into(),
            last_change,
        })
    }

    /// `owner/name`
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }

    /// Change-point used in archive names: epoch milliseconds of the last change.
    pub fn change_point(&self) -> i64 {
        self.last_change.timestamp_millis()
    }
}

fn is_path_component(s: &str) -> bool {
    !s.is_empty() && s != "." && s != ".." && !s.contains(['/', '\\', '\0'])
}
