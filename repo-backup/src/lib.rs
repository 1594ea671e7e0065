//! Repository Backup Library
//!
//! Discovers hosted git repositories, mirrors each one that changed since its
//! last backup into a timestamped archive, and prunes old archives.

pub mod config;
pub mod daemon;
pub mod executor;
pub mod repo;
pub mod services;
pub mod store;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use utils::errors::BackupError;
pub type Result<T> = std::result::Result<T, BackupError>;
