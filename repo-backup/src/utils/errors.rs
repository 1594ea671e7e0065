//! Custom error types for repository backups.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Mirror clone failed: {0}")]
    Mirror(String),

    #[error("Archive creation failed: {0}")]
    Archive(String),

    #[error("Repository discovery failed: {0}")]
    Discovery(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Schedule error: {0}")]
    Schedule(String),
}

pub type Result<T> = std::result::Result<T, BackupError>;
