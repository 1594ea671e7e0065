//! Mirror clone capability.

use crate::utils::redact::{credentials, redact_url, scrub};
use crate::{BackupError, Result};
use std::path::{Path, PathBuf};
use std::process::Command;

/// Produces a full mirror of a remote repository in a local directory.
pub trait MirrorCloner: Send + Sync {
    /// Mirror `url` into `destination`, which already exists and is empty.
    /// `url` may carry credentials as userinfo.
    fn mirror_clone(&self, url: &str, destination: &Path) -> Result<()>;
}

/// Mirror clone through the `git` command-line client.
#[derive(Debug, Clone)]
pub struct GitMirror {
    git: PathBuf,
}

impl GitMirror {
    pub fn new(git: impl Into<PathBuf>) -> Self {
        Self { git: git.into() }
    }
}

impl Default for GitMirror {
    fn default() -> Self {
        Self::new("git")
    }
}

impl MirrorCloner for GitMirror {
    fn mirror_clone(&self, url: &str, destination: &Path) -> Result<()> {
        let output = Command::new(&self.git)
            .args(["clone", "--mirror", "--quiet"])
            .arg(url)
            .arg(".")
            .current_dir(destination)
            .env("GIT_TERMINAL_PROMPT", "0")
            .output()
            .map_err(|e| BackupError::Mirror(format!("failed to spawn {}: {e}", self.git.display())))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = match credentials(url) {
                Some(secret) => scrub(&stderr, &secret),
                None => stderr.into_owned(),
            };
            return Err(BackupError::Mirror(format!(
                "git clone --mirror {} exited with {}: {}",
                redact_url(url),
                output.status,
                stderr.trim().replace('\n', " ")
            )));
        }

        Ok(())
    }
}
