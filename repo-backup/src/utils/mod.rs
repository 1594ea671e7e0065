//! Utility modules for repository backups.

pub mod errors;
pub mod logger;
pub mod redact;

pub use errors::{BackupError, Result};
