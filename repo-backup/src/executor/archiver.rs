//! Archive capability.
//!
//! Turns the contents of a staging directory into a single archive file
//! written inside that same directory.

use crate::{BackupError, Result};
use std::fmt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;
use std::sync::Arc;
use walkdir::WalkDir;

pub trait Archiver: Send + Sync {
    /// File extension of produced archives, without the leading dot.
    fn extension(&self) -> &str;

    /// Archive the contents of `source_dir` into `source_dir/archive_name`.
    /// Returns the path of the finished archive.
    fn create_archive(&self, source_dir: &Path, archive_name: &str) -> Result<PathBuf>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    TarZstd,
}

impl ArchiveFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ArchiveFormat::Zip => "zip",
            ArchiveFormat::TarZstd => "tar.zst",
        }
    }

    pub fn archiver(&self) -> Arc<dyn Archiver> {
        match self {
            ArchiveFormat::Zip => Arc::new(ZipCommandArchiver::default()),
            ArchiveFormat::TarZstd => Arc::new(TarZstdArchiver::default()),
        }
    }
}

impl FromStr for ArchiveFormat {
    type Err = BackupError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().trim_start_matches('.').to_ascii_lowercase().as_str() {
            "zip" => Ok(ArchiveFormat::Zip),
            "tar.zst" | "tar.zstd" => Ok(ArchiveFormat::TarZstd),
            other => Err(BackupError::Config(format!("unsupported archive format: {other}"))),
        }
    }
}

impl fmt::Display for ArchiveFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Zip archives via the external `zip` tool.
#[derive(Debug, Clone)]
pub struct ZipCommandArchiver {
    zip: PathBuf,
}

impl Default for ZipCommandArchiver {
    fn default() -> Self {
        Self { zip: PathBuf::from("zip") }
    }
}

impl Archiver for ZipCommandArchiver {
    fn extension(&self) -> &str {
        ArchiveFormat::Zip.extension()
    }

    fn create_archive(&self, source_dir: &Path, archive_name: &str) -> Result<PathBuf> {
        let output = Command::new(&self.zip)
            .args(["-q", "-r", "-y"])
            .arg(archive_name)
            .arg(".")
            .current_dir(source_dir)
            .output()
            .map_err(|e| BackupError::Archive(format!("failed to spawn {}: {e}", self.zip.display())))?;

        if !output.status.success() {
            return Err(BackupError::Archive(format!(
                "zip exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let archive = source_dir.join(archive_name);
        if !archive.is_file() {
            return Err(BackupError::Archive(format!("zip did not produce {}", archive.display())));
        }
        Ok(archive)
    }
}

/// Tar archives compressed with zstd, built in-process.
#[derive(Debug, Clone)]
pub struct TarZstdArchiver {
    level: i32,
}

impl TarZstdArchiver {
    pub fn new(level: i32) -> Self {
        Self { level }
    }
}

impl Default for TarZstdArchiver {
    fn default() -> Self {
        Self::new(3)
    }
}

impl Archiver for TarZstdArchiver {
    fn extension(&self) -> &str {
        ArchiveFormat::TarZstd.extension()
    }

    fn create_archive(&self, source_dir: &Path, archive_name: &str) -> Result<PathBuf> {
        let archive = source_dir.join(archive_name);
        let file = File::create(&archive)?;
        let encoder = zstd::stream::write::Encoder::new(file, self.level)?;
        let mut builder = tar::Builder::new(encoder);
        builder.follow_symlinks(false);

        for entry in WalkDir::new(source_dir).min_depth(1).sort_by_file_name() {
            let entry = entry.map_err(|e| BackupError::Archive(e.to_string()))?;
            if entry.path() == archive {
                continue;
            }
            let relative = entry
                .path()
                .strip_prefix(source_dir)
                .map_err(|e| BackupError::Archive(e.to_string()))?;
            builder.append_path_with_name(entry.path(), relative)?;
        }

        let encoder = builder.into_inner()?;
        let file = encoder.finish()?;
        file.sync_all()?;

        Ok(archive)
    }
}
