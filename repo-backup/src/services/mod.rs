//! Backup run orchestration and scheduling.

pub mod coordinator;
pub mod scheduler;
