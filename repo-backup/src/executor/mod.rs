//! Backup executor - runs the backup transaction for one repository.
//!
//! A transaction clears any staging residue, skips the repository if an
//! archive for its current change-point already exists, and otherwise
//! mirrors it into the staging directory, archives the mirror, renames the
//! finished archive into the backup location and prunes old archives.
//!
//! The rename is the only step that touches the set of archives visible in
//! the backup location, so a failed transaction never leaves a partial
//! archive behind.

pub mod archiver;
pub mod mirror;

#[cfg(test)]
pub(crate) mod testing;

use crate::config::Config;
use crate::repo::RepositoryDescriptor;
use crate::store::inventory::{is_up_to_date, list_archives};
use crate::store::naming::archive_file_name;
use crate::store::retention::prune_if_needed;
use crate::store::{remove_dir_if_exists, BackupLayout};
use crate::utils::redact::authenticated_url;
use crate::Result;
use archiver::Archiver;
use mirror::{GitMirror, MirrorCloner};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Result of one backup transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    /// A new archive was installed; `pruned` is the archive removed by retention, if any.
    Archived {
        archive: PathBuf,
        pruned: Option<PathBuf>,
    },

    /// An archive for the current change-point already exists.
    UpToDate,

    /// The transaction was abandoned.
    Failed(String),
}

impl BackupOutcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, BackupOutcome::Failed(_))
    }
}

/// Runs backup transactions against one backup root.
pub struct BackupExecutor {
    layout: BackupLayout,
    token: String,
    max_backups: Option<usize>,
    mirror: Arc<dyn MirrorCloner>,
    archiver: Arc<dyn Archiver>,
}

impl BackupExecutor {
    pub fn new(
        layout: BackupLayout,
        token: impl Into<String>,
        max_backups: Option<usize>,
        mirror: Arc<dyn MirrorCloner>,
        archiver: Arc<dyn Archiver>,
    ) -> Self {
        Self {
            layout,
            token: token.into(),
            max_backups,
            mirror,
            archiver,
        }
    }

    /// Executor using `git` and the configured archive format.
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            BackupLayout::new(&config.backup_dir),
            config.github_token.clone(),
            config.max_backups,
            Arc::new(GitMirror::default()),
            config.archive_format.archiver(),
        )
    }

    pub fn layout(&self) -> &BackupLayout {
        &self.layout
    }

    /// Back up one repository. Never fails: errors become [`BackupOutcome::Failed`].
    pub fn backup_repository(&self, repo: &RepositoryDescriptor) -> BackupOutcome {
        let full_name = repo.full_name();
        match self.try_backup(repo) {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(repo = %full_name, error = %e, "Backup failed");
                let staging = self.layout.staging(&self.layout.location(repo));
                if let Err(cleanup) = remove_dir_if_exists(&staging) {
                    warn!(path = %staging.display(), error = %cleanup, "Failed to remove staging directory");
                }
                BackupOutcome::Failed(e.to_string())
            }
        }
    }

    fn try_backup(&self, repo: &RepositoryDescriptor) -> Result<BackupOutcome> {
        let full_name = repo.full_name();
        let location = self.layout.location(repo);
        let staging = self.layout.staging(&location);

        // Residue of a crashed attempt
        remove_dir_if_exists(&staging)?;
        fs::create_dir_all(&location)?;

        let change_point = repo.change_point();
        let inventory = list_archives(&location, self.archiver.extension())?;
        if is_up_to_date(&inventory, change_point) {
            info!(repo = %full_name, change_point, "Backup is up-to-date, skipping");
            return Ok(BackupOutcome::UpToDate);
        }

        fs::create_dir_all(&staging)?;
        let archive_name = archive_file_name(&repo.name, change_point, self.archiver.extension());

        info!(repo = %full_name, "Cloning");
        let url = authenticated_url(&repo.clone_url, &self.token);
        self.mirror.mirror_clone(&url, &staging)?;

        let staged = self.archiver.create_archive(&staging, &archive_name)?;
        info!(repo = %full_name, archive = %archive_name, "Cloned and archived");

        let installed = location.join(&archive_name);
        fs::rename(&staged, &installed)?;
        remove_dir_if_exists(&staging)?;

        let pruned = self
            .max_backups
            .and_then(|max| prune_if_needed(&location, &inventory, max));

        info!(repo = %full_name, path = %installed.display(), "Backup installed");
        Ok(BackupOutcome::Archived {
            archive: installed,
            pruned,
        })
    }
}
