//! Configuration for repository backups.
//!
//! Read once at startup from the environment (with `.env` support) into an
//! immutable [`Config`] that is passed to every component.

use crate::executor::archiver::ArchiveFormat;
use crate::{BackupError, Result};
use std::fmt;
use std::path::PathBuf;

#[derive(Clone)]
pub struct Config {
    /// Access token for discovery and clone URLs
    pub github_token: String,

    /// Base URL of the GitHub REST API
    pub github_api_url: String,

    /// Organisations backed up in addition to the authenticated account
    pub organisations: Vec<String>,

    /// Affiliation filter passed through to repository listing
    pub affiliation: Option<String>,

    /// Root directory holding one backup location per repository
    pub backup_dir: PathBuf,

    /// Maximum archives kept per repository (None = never prune)
    pub max_backups: Option<usize>,

    /// Cron expression for periodic runs
    pub schedule: Option<String>,

    /// Archive format produced from each mirror clone
    pub archive_format: ArchiveFormat,

    /// Repositories backed up in parallel
    pub max_concurrent_repos: usize,

    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("github_token", &"***")
            .field("github_api_url", &self.github_api_url)
            .field("organisations", &self.organisations)
            .field("affiliation", &self.affiliation)
            .field("backup_dir", &self.backup_dir)
            .field("max_backups", &self.max_backups)
            .field("schedule", &self.schedule)
            .field("archive_format", &self.archive_format)
            .field("max_concurrent_repos", &self.max_concurrent_repos)
            .field("log_level", &self.log_level)
            .finish()
    }
}

impl Config {
    /// Load configuration from `.env` and the process environment.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let github_token = get("GITHUB_TOKEN").ok_or_else(|| {
            BackupError::Config("Environment variable `GITHUB_TOKEN` is required!".to_string())
        })?;

        let max_backups = get("MAX_BACKUPS")
            .map(|v| parse_number("MAX_BACKUPS", &v))
            .transpose()?;

        let max_concurrent_repos = match get("MAX_CONCURRENT_REPOS") {
            Some(v) => parse_number("MAX_CONCURRENT_REPOS", &v)?,
            None => 1,
        };
        if max_concurrent_repos == 0 {
            return Err(BackupError::Config("MAX_CONCURRENT_REPOS must be at least 1".to_string()));
        }

        let archive_format = match get("ARCHIVE_FORMAT") {
            Some(v) => v.parse()?,
            None => ArchiveFormat::Zip,
        };

        let organisations = get("ORGANISATIONS")
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            github_token,
            github_api_url: get("GITHUB_API_URL").unwrap_or_else(|| "https://api.github.com".into()),
            organisations,
            affiliation: get("AFFILIATION"),
            backup_dir: PathBuf::from(get("BACKUP_DIR").unwrap_or_else(|| "../backups".into())),
            max_backups,
            schedule: get("SCHEDULE"),
            archive_format,
            max_concurrent_repos,
            log_level: get("LOG_LEVEL").unwrap_or_else(|| "info".into()),
        })
    }
}

fn parse_number(key: &str, value: &str) -> Result<usize> {
    value
        .parse()
        .map_err(|_| BackupError::Config(format!("{key} must be a non-negative integer, got {value:?}")))
}
