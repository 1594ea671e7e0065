//! Backup runs: discovery followed by one backup transaction per repository.

use crate::config::Config;
use crate::executor::{BackupExecutor, BackupOutcome};
use crate::repo::github::GithubClient;
use crate::repo::RepositoryDescriptor;
use crate::Result;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Aggregate result of one backup run.
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub archived: usize,
    pub up_to_date: usize,
    pub pruned: usize,
    /// `(repository, reason)` for every failed transaction
    pub failed: Vec<(String, String)>,
    /// Repositories left unattempted because the run was cancelled
    pub not_attempted: usize,
    pub discovery_failed: bool,
}

impl RunSummary {
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            archived: 0,
            up_to_date: 0,
            pruned: 0,
            failed: Vec::new(),
            not_attempted: 0,
            discovery_failed: false,
        }
    }

    pub fn record(&mut self, repo: &str, outcome: &BackupOutcome) {
        match outcome {
            BackupOutcome::Archived { pruned, .. } => {
                self.archived += 1;
                if pruned.is_some() {
                    self.pruned += 1;
                }
            }
            BackupOutcome::UpToDate => self.up_to_date += 1,
            BackupOutcome::Failed(reason) => self.failed.push((repo.to_string(), reason.clone())),
        }
    }

    /// True when discovery worked and every attempted repository succeeded or was skipped.
    pub fn is_success(&self) -> bool {
        !self.discovery_failed && self.failed.is_empty() && self.not_attempted == 0
    }

    pub fn attempted(&self) -> usize {
        self.archived + self.up_to_date + self.failed.len()
    }

    fn log(&self) {
        if self.is_success() {
            info!(
                archived = self.archived,
                up_to_date = self.up_to_date,
                pruned = self.pruned,
                "Backup run complete"
            );
        } else {
            warn!(
                archived = self.archived,
                up_to_date = self.up_to_date,
                pruned = self.pruned,
                failed = self.failed.len(),
                not_attempted = self.not_attempted,
                discovery_failed = self.discovery_failed,
                "Backup run finished with errors"
            );
            for (repo, reason) in &self.failed {
                warn!(repo = %repo, reason = %reason, "Repository not backed up");
            }
        }
    }
}

/// Prevents overlapping runs within the process.
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    active: Arc<Mutex<()>>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the run slot, or `None` if a run is already active.
    pub fn try_begin(&self) -> Option<OwnedMutexGuard<()>> {
        self.active.clone().try_lock_owned().ok()
    }
}

/// Back up every repository and return the outcomes in input order.
///
/// With `max_concurrent <= 1` repositories are processed strictly one after
/// another. Otherwise up to `max_concurrent` transactions run in parallel,
/// never two for the same backup location. Cancellation stops new
/// transactions from starting; repositories not attempted are left out.
pub async fn run_backups(
    executor: Arc<BackupExecutor>,
    repos: Vec<RepositoryDescriptor>,
    max_concurrent: usize,
    cancel: &CancellationToken,
) -> Vec<(String, BackupOutcome)> {
    info!(count = repos.len(), "Creating a backup of repositories");

    if max_concurrent <= 1 {
        let mut results = Vec::with_capacity(repos.len());
        for repo in repos {
            if cancel.is_cancelled() {
                warn!("Backup run cancelled");
                break;
            }
            let name = repo.full_name();
            let outcome = backup_blocking(executor.clone(), repo).await;
            results.push((name, outcome));
        }
        return results;
    }

    let semaphore = Arc::new(Semaphore::new(max_concurrent));
    let mut location_locks: HashMap<PathBuf, Arc<Mutex<()>>> = HashMap::new();
    let mut tasks = JoinSet::new();

    for (idx, repo) in repos.into_iter().enumerate() {
        let location_lock = location_locks
            .entry(executor.layout().location(&repo))
            .or_default()
            .clone();
        let sem = Arc::clone(&semaphore);
        let executor = Arc::clone(&executor);
        let cancel = cancel.clone();

        tasks.spawn(async move {
            let name = repo.full_name();
            let _location = location_lock.lock_owned().await;
            let permit = tokio::select! {
                permit = sem.acquire_owned() => permit.ok(),
                _ = cancel.cancelled() => None,
            };
            let Some(_permit) = permit else {
                return (idx, name, None);
            };
            if cancel.is_cancelled() {
                return (idx, name, None);
            }
            let outcome = backup_blocking(executor, repo).await;
            (idx, name, Some(outcome))
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((idx, name, Some(outcome))) => results.push((idx, name, outcome)),
            Ok((_, name, None)) => warn!(repo = %name, "Backup not attempted: run cancelled"),
            Err(e) => error!(error = %e, "Backup task failed"),
        }
    }
    results.sort_by_key(|(idx, _, _)| *idx);
    results.into_iter().map(|(_, name, outcome)| (name, outcome)).collect()
}

/// Transactions do blocking filesystem and process work.
async fn backup_blocking(executor: Arc<BackupExecutor>, repo: RepositoryDescriptor) -> BackupOutcome {
    tokio::task::spawn_blocking(move || executor.backup_repository(&repo))
        .await
        .unwrap_or_else(|e| BackupOutcome::Failed(format!("backup task panicked: {e}")))
}

/// Discovers repositories and backs them up, one run at a time.
pub struct BackupRunner {
    discovery: GithubClient,
    executor: Arc<BackupExecutor>,
    max_concurrent: usize,
    guard: RunGuard,
    cancel: CancellationToken,
}

impl BackupRunner {
    pub fn new(config: &Config, cancel: CancellationToken) -> Result<Self> {
        Ok(Self {
            discovery: GithubClient::new(config)?,
            executor: Arc::new(BackupExecutor::from_config(config)),
            max_concurrent: config.max_concurrent_repos,
            guard: RunGuard::new(),
            cancel,
        })
    }

    /// Run one backup pass. Returns `None` if another run is still active.
    pub async fn run_once(&self) -> Option<RunSummary> {
        let Some(_active) = self.guard.try_begin() else {
            warn!("Skipping backup run: previous run still active");
            return None;
        };

        let run_id = Uuid::new_v4();
        let summary = self
            .run_inner(run_id)
            .instrument(info_span!("backup_run", %run_id))
            .await;
        Some(summary)
    }

    async fn run_inner(&self, run_id: Uuid) -> RunSummary {
        let mut summary = RunSummary::new(run_id);

        let repos = match self.discovery.list_repositories().await {
            Ok(repos) => repos,
            Err(e) => {
                error!(error = %e, "Repository discovery failed, nothing backed up this run");
                summary.discovery_failed = true;
                summary.log();
                return summary;
            }
        };

        let total = repos.len();
        let results = run_backups(self.executor.clone(), repos, self.max_concurrent, &self.cancel).await;
        for (name, outcome) in &results {
            summary.record(name, outcome);
        }
        summary.not_attempted = total - results.len();
        summary.log();
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::testing::{FakeArchiver, FakeMirror};
    use crate::store::BackupLayout;
    use chrono::{TimeZone, Utc};
    use std::fs;
    use std::path::Path;
    use tempfile::TempDir;

    fn repo(owner: &str, name: &str, change_point: i64) -> RepositoryDescriptor {
        RepositoryDescriptor::new(
            owner,
            name,
            format!("https://github.com/{owner}/{name}.git"),
            Utc.timestamp_millis_opt(change_point).unwrap(),
        )
        .unwrap()
    }

    fn executor(root: &Path, mirror: FakeMirror) -> Arc<BackupExecutor> {
        Arc::new(BackupExecutor::new(
            BackupLayout::new(root),
            "tok",
            Some(2),
            Arc::new(mirror),
            Arc::new(FakeArchiver::default()),
        ))
    }

    #[tokio::test]
    async fn test_failure_does_not_stop_run() {
        let root = TempDir::new().unwrap();
        let executor = executor(root.path(), FakeMirror::failing_on("/broken"));
        let repos = vec![repo("acme", "widget", 100), repo("acme", "broken", 100), repo("acme", "gadget", 100)];

        let results = run_backups(executor, repos, 1, &CancellationToken::new()).await;

        let names: Vec<&str> = results.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["acme/widget", "acme/broken", "acme/gadget"]);
        assert!(matches!(results[0].1, BackupOutcome::Archived { .. }));
        assert!(results[1].1.is_failure());
        assert!(matches!(results[2].1, BackupOutcome::Archived { .. }));
        assert!(root.path().join("acme/gadget/gadget-100.zip").exists());
        assert!(!root.path().join("acme/broken/broken-100.zip").exists());
    }

    #[tokio::test]
    async fn test_concurrent_run_preserves_order() {
        let root = TempDir::new().unwrap();
        let executor = executor(root.path(), FakeMirror::default());
        let repos: Vec<_> = (0..6).map(|i| repo("acme", &format!("repo{i}"), 1000 + i)).collect();

        let results = run_backups(executor, repos, 3, &CancellationToken::new()).await;

        assert_eq!(results.len(), 6);
        for (i, (name, outcome)) in results.iter().enumerate() {
            assert_eq!(name, &format!("acme/repo{i}"));
            assert!(matches!(outcome, BackupOutcome::Archived { .. }));
        }
    }

    #[tokio::test]
    async fn test_duplicate_locations_are_serialized() {
        let root = TempDir::new().unwrap();
        let executor = executor(root.path(), FakeMirror::default());
        let repos = vec![repo("acme", "widget", 100), repo("acme", "widget", 100)];

        let results = run_backups(executor, repos, 4, &CancellationToken::new()).await;

        let archived = results
            .iter()
            .filter(|(_, o)| matches!(o, BackupOutcome::Archived { .. }))
            .count();
        let up_to_date = results.iter().filter(|(_, o)| *o == BackupOutcome::UpToDate).count();
        assert_eq!((archived, up_to_date), (1, 1));
    }

    #[tokio::test]
    async fn test_cancelled_run_attempts_nothing() {
        let root = TempDir::new().unwrap();
        let executor = executor(root.path(), FakeMirror::default());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let results = run_backups(executor.clone(), vec![repo("acme", "widget", 100)], 1, &cancel).await;
        assert!(results.is_empty());

        let results = run_backups(executor, vec![repo("acme", "widget", 100)], 2, &cancel).await;
        assert!(results.is_empty());
        assert!(!root.path().join("acme/widget").exists());
    }

    #[test]
    fn test_summary_aggregation() {
        let mut summary = RunSummary::new(Uuid::new_v4());
        summary.record(
            "acme/widget",
            &BackupOutcome::Archived {
                archive: PathBuf::from("widget-300.zip"),
                pruned: Some(PathBuf::from("widget-100.zip")),
            },
        );
        summary.record("acme/gadget", &BackupOutcome::UpToDate);
        assert!(summary.is_success());

        summary.record("acme/broken", &BackupOutcome::Failed("remote hung up".into()));
        assert_eq!((summary.archived, summary.up_to_date, summary.pruned), (1, 1, 1));
        assert_eq!(summary.attempted(), 3);
        assert!(!summary.is_success());
    }

    #[tokio::test]
    async fn test_run_guard_excludes_overlap() {
        let guard = RunGuard::new();
        let first = guard.try_begin();
        assert!(first.is_some());
        assert!(guard.clone().try_begin().is_none());
        drop(first);
        assert!(guard.try_begin().is_some());
    }

    #[tokio::test]
    async fn test_discovery_failure_is_reported() {
        let root = TempDir::new().unwrap();
        let backup_dir = root.path().to_string_lossy().to_string();
        let config = Config::from_lookup(|key| match key {
            "GITHUB_TOKEN" => Some("tok".to_string()),
            "GITHUB_API_URL" => Some("http://127.0.0.1:1".to_string()),
            "BACKUP_DIR" => Some(backup_dir.clone()),
            _ => None,
        })
        .unwrap();
        let runner = BackupRunner::new(&config, CancellationToken::new()).unwrap();

        let summary = runner.run_once().await.unwrap();

        assert!(summary.discovery_failed);
        assert_eq!(summary.attempted(), 0);
        assert!(!summary.is_success());
        assert_eq!(fs::read_dir(root.path()).unwrap().count(), 0);
    }
}
