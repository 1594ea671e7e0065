//! In-process stand-ins for the mirror and archive tools.

use super::archiver::Archiver;
use super::mirror::MirrorCloner;
use crate::{BackupError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Writes a fake bare repository and records the URLs it was asked to clone.
#[derive(Default)]
pub struct FakeMirror {
    pub urls: Mutex<Vec<String>>,
    /// Fail every clone whose URL contains this text
    pub fail_on: Option<String>,
}

impl FakeMirror {
    pub fn failing_on(pattern: &str) -> Self {
        Self {
            fail_on: Some(pattern.to_string()),
            ..Default::default()
        }
    }

    pub fn cloned_urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

impl MirrorCloner for FakeMirror {
    fn mirror_clone(&self, url: &str, destination: &Path) -> Result<()> {
        self.urls.lock().unwrap().push(url.to_string());
        if self.fail_on.as_deref().is_some_and(|p| url.contains(p)) {
            return Err(BackupError::Mirror("remote hung up".to_string()));
        }
        assert_eq!(fs::read_dir(destination)?.count(), 0, "staging must start empty");
        fs::write(destination.join("HEAD"), b"ref: refs/heads/main\n")?;
        fs::create_dir_all(destination.join("objects"))?;
        Ok(())
    }
}

/// Writes the archive into the staging directory, checking that nothing with
/// the final name is visible in the backup location yet.
#[derive(Default)]
pub struct FakeArchiver {
    pub calls: AtomicUsize,
    pub fail: bool,
}

impl FakeArchiver {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Archiver for FakeArchiver {
    fn extension(&self) -> &str {
        "zip"
    }

    fn create_archive(&self, source_dir: &Path, archive_name: &str) -> Result<PathBuf> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let location = source_dir.parent().expect("staging has a parent");
        assert!(!location.join(archive_name).exists(), "archive visible before install");

        let archive = source_dir.join(archive_name);
        if self.fail {
            fs::write(&archive, b"partial")?;
            return Err(BackupError::Archive("disk full".to_string()));
        }
        fs::write(&archive, b"complete archive")?;
        Ok(archive)
    }
}
