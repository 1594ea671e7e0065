//! Periodic backup runs driven by a cron expression.

use crate::services::coordinator::BackupRunner;
use crate::{BackupError, Result};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};

pub struct BackupScheduler {
    scheduler: Mutex<JobScheduler>,
    runner: Arc<BackupRunner>,
}

impl BackupScheduler {
    pub async fn new(runner: Arc<BackupRunner>) -> anyhow::Result<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            runner,
        })
    }

    /// Run a backup pass on every tick of `expression`.
    pub async fn schedule(&self, expression: &str) -> anyhow::Result<()> {
        let cron = normalize_cron(expression)?;
        let runner = self.runner.clone();

        let job = Job::new_async(cron.as_str(), move |_uuid, _lock| {
            let runner = runner.clone();
            Box::pin(async move {
                tracing::info!("Starting scheduled backup");
                runner.run_once().await;
            })
        })?;

        self.scheduler.lock().await.add(job).await?;
        tracing::info!(cron = %cron, "Backup scheduled");
        Ok(())
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        self.scheduler.lock().await.start().await?;
        Ok(())
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.scheduler.lock().await.shutdown().await?;
        Ok(())
    }
}

/// Accept five-field cron expressions by prepending a seconds field.
/// Six- and seven-field expressions pass through unchanged.
pub fn normalize_cron(expression: &str) -> Result<String> {
    let fields: Vec<&str> = expression.split_whitespace().collect();
    match fields.len() {
        5 => Ok(format!("0 {}", fields.join(" "))),
        6 | 7 => Ok(fields.join(" ")),
        n => Err(BackupError::Schedule(format!(
            "expected 5 to 7 fields in cron expression {expression:?}, got {n}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_normalize_cron() {
        assert_eq!(normalize_cron("0 3 * * *").unwrap(), "0 0 3 * * *");
        assert_eq!(normalize_cron("*/30  *  * * * *").unwrap(), "*/30 * * * * *");
        assert_eq!(normalize_cron("0 0 3 * * * 2030").unwrap(), "0 0 3 * * * 2030");
        assert!(matches!(normalize_cron("daily"), Err(BackupError::Schedule(_))));
        assert!(normalize_cron("").is_err());
    }

    #[tokio::test]
    async fn test_schedule_rejects_invalid_expression() {
        let config = Config::from_lookup(|key| (key == "GITHUB_TOKEN").then(|| "tok".to_string())).unwrap();
        let runner = Arc::new(BackupRunner::new(&config, CancellationToken::new()).unwrap());
        let scheduler = BackupScheduler::new(runner).await.unwrap();

        assert!(scheduler.schedule("0 3 * *").await.is_err());
        assert!(scheduler.schedule("0 3 * * *").await.is_ok());
    }
}
