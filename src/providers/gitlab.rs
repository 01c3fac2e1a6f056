use async_trait::async_trait;
use chrono::{DateTime, Utc};
use purr_core::PullRequest;
use serde::Deserialize;

use super::{checked_response, decode, Page, Provider, ProviderError, RepoId, Result};

#[derive(Clone, Deserialize, Debug)]
struct GitlabUser {
    username: String,
}

#[derive(Clone, Deserialize, Debug)]
struct RawGitlabMergeRequest {
    iid: u64,
    title: String,
    web_url: String,
    updated_at: DateTime<Utc>,
    author: GitlabUser,
    assignee: Option<GitlabUser>,
    #[serde(default)]
    draft: bool,
    #[serde(default)]
    work_in_progress: bool,
}

/// GitLab merge requests. GitLab has no chronological review verdicts, so
/// records from this provider are never enriched.
pub struct GitlabClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl GitlabClient {
    pub fn new<S1: Into<String>, S2: AsRef<str>>(token: S1, base_url: S2) -> GitlabClient {
        GitlabClient {
            http: reqwest::Client::new(),
            base_url: base_url.as_ref().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    fn merge_requests_url(&self, repo: &RepoId) -> std::result::Result<reqwest::Url, String> {
        let mut url = reqwest::Url::parse(&self.base_url).map_err(|e| e.to_string())?;
        url.path_segments_mut()
            .map_err(|_| format!("{} cannot be a base url", self.base_url))?
            .pop_if_empty()
            .extend(["api", "v4", "projects"])
            .push(&repo.to_string())
            .push("merge_requests");
        Ok(url)
    }
}

#[async_trait]
impl Provider for GitlabClient {
    fn name(&self) -> &str {
        "GitLab"
    }

    async fn list_open_pull_requests(&self, repo: &RepoId, page: u32) -> Result<Page<PullRequest>> {
        let operation = format!("list GitLab merge requests of {repo}");
        let url = self
            .merge_requests_url(repo)
            .map_err(|reason| ProviderError::InvalidUrl {
                url: self.base_url.clone(),
                reason,
            })?;

        let request = self
            .http
            .get(url)
            .query(&[("state", "opened".to_string()), ("page", page.to_string())])
            .header("PRIVATE-TOKEN", &self.token);

        let response = checked_response(&operation, request).await?;
        let next_page = response
            .headers()
            .get("x-next-page")
            .and_then(|next| next.to_str().ok())
            .and_then(|next| next.trim().parse().ok());
        let raw: Vec<RawGitlabMergeRequest> = decode(&operation, response).await?;

        let repository = repo.to_string();
        Ok(Page {
            items: raw
                .into_iter()
                .map(|raw| PullRequest {
                    id: raw.iid,
                    author: raw.author.username,
                    assignee: raw
                        .assignee
                        .map(|a| a.username)
                        .filter(|a| !a.is_empty()),
                    repository: repository.clone(),
                    title: raw.title,
                    web_link: raw.web_url,
                    updated: raw.updated_at,
                    requires_changes: false,
                    approved: false,
                    draft: raw.draft || raw.work_in_progress,
                })
                .collect(),
            next_page,
        })
    }
}
