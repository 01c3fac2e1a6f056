pub mod github;
pub mod gitlab;

use std::fmt;

use async_trait::async_trait;
use purr_core::{PullRequest, Verdict};
use thiserror::Error;

pub use github::GithubClient;
pub use gitlab::GitlabClient;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("{0} is not a valid repository, expected owner/name")]
    InvalidRepository(String),
    #[error("{url} is not a usable base url: {reason}")]
    InvalidUrl { url: String, reason: String },
    #[error("Request failed for {operation}: {underlying_error}")]
    Request {
        operation: String,
        underlying_error: reqwest::Error,
    },
    #[error("Got unexpected status {status} from {operation}, body: {body}")]
    UnexpectedStatus {
        operation: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("Could not decode response from {operation}: {underlying_error}")]
    UnexpectedOutput {
        operation: String,
        underlying_error: reqwest::Error,
    },
}

pub type Result<T> = std::result::Result<T, ProviderError>;

/// A repository identifier of the form `owner/name`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    pub fn parse<S: AsRef<str>>(repository: S) -> Result<RepoId> {
        let repository = repository.as_ref();
        match repository.split_once('/') {
            Some((owner, name)) if !owner.is_empty() && !name.is_empty() && !name.contains('/') => {
                Ok(RepoId {
                    owner: owner.to_string(),
                    name: name.to_string(),
                })
            }
            _ => Err(ProviderError::InvalidRepository(repository.to_string())),
        }
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// One page of a paginated listing. `next_page` is `None` on the last page.
#[derive(Clone, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page: Option<u32>,
}

impl<T> Page<T> {
    pub fn last(items: Vec<T>) -> Page<T> {
        Page {
            items,
            next_page: None,
        }
    }
}

/// A code hosting service that can list open pull requests.
///
/// Pages are numbered from 1.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;

    async fn list_open_pull_requests(&self, repo: &RepoId, page: u32) -> Result<Page<PullRequest>>;

    /// Whether `list_review_transitions` returns anything meaningful.
    fn has_review_history(&self) -> bool {
        false
    }

    /// Review verdicts of one pull request, oldest first.
    async fn list_review_transitions(
        &self,
        _repo: &RepoId,
        _id: u64,
        _page: u32,
    ) -> Result<Page<Verdict>> {
        Ok(Page::last(vec![]))
    }
}

/// Keeps requesting pages until the provider reports there is no next page.
pub(crate) async fn collect_pages<T, F, Fut>(mut fetch: F) -> Result<Vec<T>>
where
    F: FnMut(u32) -> Fut,
    Fut: std::future::Future<Output = Result<Page<T>>>,
{
    let mut items = vec![];
    let mut page = 1;

    loop {
        let Page {
            items: page_items,
            next_page,
        } = fetch(page).await?;
        items.extend(page_items);

        match next_page {
            Some(next) if next > page => page = next,
            _ => break,
        }
    }

    Ok(items)
}

pub(crate) async fn checked_response(
    operation: &str,
    request: reqwest::RequestBuilder,
) -> Result<reqwest::Response> {
    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::Request {
            operation: operation.to_string(),
            underlying_error: e,
        })?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ProviderError::UnexpectedStatus {
            operation: operation.to_string(),
            status,
            body,
        });
    }

    Ok(response)
}

pub(crate) async fn decode<T: serde::de::DeserializeOwned>(
    operation: &str,
    response: reqwest::Response,
) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| ProviderError::UnexpectedOutput {
            operation: operation.to_string(),
            underlying_error: e,
        })
}
