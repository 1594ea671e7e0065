//! Repository discovery against the GitHub REST API.
//!
//! Lists every repository visible to the authenticated account, page by page,
//! and keeps those owned by the account itself or one of the configured
//! organisations.

use super::RepositoryDescriptor;
use crate::config::Config;
use crate::{BackupError, Result};
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, warn};

const PER_PAGE: usize = 100;

#[derive(Debug, Deserialize)]
struct GithubUser {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GithubOwner {
    login: String,
}

#[derive(Debug, Deserialize)]
struct GithubRepo {
    name: String,
    full_name: String,
    clone_url: String,
    owner: GithubOwner,
    pushed_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl GithubRepo {
    /// Repositories that were never pushed fall back to `updated_at`.
    fn into_descriptor(self) -> Option<RepositoryDescriptor> {
        let Some(last_change) = self.pushed_at.or(self.updated_at) else {
            warn!(repo = %self.full_name, "Skipping repository without a change timestamp");
            return None;
        };
        match RepositoryDescriptor::new(self.owner.login, self.name, self.clone_url, last_change) {
            Ok(descriptor) => Some(descriptor),
            Err(e) => {
                warn!(repo = %self.full_name, error = %e, "Skipping repository");
                None
            }
        }
    }
}

pub struct GithubClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
    organisations: Vec<String>,
    affiliation: Option<String>,
}

impl GithubClient {
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("repo-backup/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http,
            api_url: config.github_api_url.trim_end_matches('/').to_string(),
            token: config.github_token.clone(),
            organisations: config.organisations.clone(),
            affiliation: config.affiliation.clone(),
        })
    }

    /// Login of the account the token belongs to.
    pub async fn authenticated_login(&self) -> Result<String> {
        let user: GithubUser = self.get_json("/user", &[]).await?;
        Ok(user.login)
    }

    /// All repositories owned by the authenticated account or a configured
    /// organisation.
    pub async fn list_repositories(&self) -> Result<Vec<RepositoryDescriptor>> {
        let login = self.authenticated_login().await?;
        let mut owners = vec![login];
        owners.extend(self.organisations.iter().cloned());

        let mut repos = Vec::new();
        let mut page = 1usize;
        loop {
            let mut query = vec![
                ("per_page", PER_PAGE.to_string()),
                ("page", page.to_string()),
            ];
            if let Some(affiliation) = &self.affiliation {
                query.push(("affiliation", affiliation.clone()));
            }

            let batch: Vec<GithubRepo> = self.get_json("/user/repos", &query).await?;
            let batch_len = batch.len();
            debug!(page, count = batch_len, "Fetched repository page");
            repos.extend(batch);

            if batch_len < PER_PAGE {
                break;
            }
            page += 1;
        }

        let selected = select_owned(repos, &owners);
        info!(count = selected.len(), owners = ?owners, "Discovered repositories");
        Ok(selected)
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = format!("{}{}", self.api_url, path);
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.token)
            .header("Accept", "application/vnd.github+json")
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(BackupError::Discovery(format!("HTTP {status}: {url}")));
        }

        Ok(response.json().await?)
    }
}

/// Keep repositories whose owner is in `owners` (logins compare case-insensitively).
fn select_owned(repos: Vec<GithubRepo>, owners: &[String]) -> Vec<RepositoryDescriptor> {
    repos
        .into_iter()
        .filter(|r| owners.iter().any(|o| o.eq_ignore_ascii_case(&r.owner.login)))
        .filter_map(GithubRepo::into_descriptor)
        .collect()
}
