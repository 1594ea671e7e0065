//! On-disk layout of backups.
//!
//! One directory per repository under the backup root (`<root>/<owner>/<name>`),
//! holding the archives and, while a backup is in flight, a staging directory.

pub mod inventory;
pub mod naming;
pub mod retention;

use crate::repo::RepositoryDescriptor;
use crate::Result;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Name of the staging directory inside a backup location.
pub const STAGING_DIR: &str = "cloned";

#[derive(Debug, Clone)]
pub struct BackupLayout {
    root: PathBuf,
}

impl BackupLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Backup location for a repository.
    pub fn location(&self, repo: &RepositoryDescriptor) -> PathBuf {
        self.root.join(&repo.owner).join(&repo.name)
    }

    /// Staging directory within a backup location.
    pub fn staging(&self, location: &Path) -> PathBuf {
        location.join(STAGING_DIR)
    }
}

/// Remove a directory tree, treating a missing path as success.
pub fn remove_dir_if_exists(path: &Path) -> Result<()> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
