use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use purr_core::{PullRequest, Verdict};
use serde::Deserialize;

use super::{checked_response, collect_pages, decode, Page, Provider, RepoId, Result};

pub const DEFAULT_API_URL: &str = "https://api.github.com";

#[derive(Clone, Deserialize, Debug)]
struct GithubUser {
    login: String,
}

#[derive(Clone, Deserialize, Debug)]
struct RawGithubPullRequest {
    number: u64,
    title: String,
    html_url: String,
    updated_at: DateTime<Utc>,
    user: GithubUser,
    assignee: Option<GithubUser>,
    #[serde(default)]
    draft: bool,
}

#[derive(Clone, Deserialize, Debug)]
struct RawGithubReview {
    state: String,
}

#[derive(Clone, Deserialize, Debug)]
struct RawGithubRepository {
    full_name: String,
}

pub struct GithubClient {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl GithubClient {
    pub fn new<S1: Into<String>, S2: AsRef<str>>(token: S1, api_url: S2) -> GithubClient {
        GithubClient {
            http: reqwest::Client::new(),
            api_url: api_url.as_ref().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }

    async fn get_page<T: serde::de::DeserializeOwned>(
        &self,
        operation: &str,
        path: &str,
        query: Vec<(&str, String)>,
    ) -> Result<Page<T>> {
        let request = self
            .http
            .get(format!("{}{path}", self.api_url))
            .query(&query)
            .header("Accept", "application/vnd.github+json")
            .header("User-Agent", "purr");
        let request = if self.token.is_empty() {
            request
        } else {
            request.bearer_auth(&self.token)
        };

        let response = checked_response(operation, request).await?;
        let next_page = response
            .headers()
            .get(reqwest::header::LINK)
            .and_then(|link| link.to_str().ok())
            .and_then(next_page_from_link);
        let items = decode(operation, response).await?;

        Ok(Page { items, next_page })
    }

    /// Expands organisations and users into their repositories and appends the
    /// explicitly listed repositories, first occurrence kept. Failed expansions
    /// are logged and skipped.
    pub async fn expand_repositories(
        &self,
        organisations: &[String],
        users: &[String],
        repositories: &[String],
    ) -> Vec<String> {
        let org_listings = organisations
            .iter()
            .map(|org| (org, format!("/orgs/{org}/repos"), "organisation"));
        let user_listings = users
            .iter()
            .map(|user| (user, format!("/users/{user}/repos"), "user"));

        let listings = futures::future::join_all(org_listings.chain(user_listings).map(
            |(owner, path, kind)| async move {
                let operation = format!("list repositories of GitHub {kind} {owner}");
                let result = collect_pages(|page| {
                    self.get_page::<RawGithubRepository>(
                        &operation,
                        &path,
                        vec![("page", page.to_string())],
                    )
                })
                .await;
                (operation, result)
            },
        ))
        .await;

        let mut expanded = vec![];
        for (operation, result) in listings {
            match result {
                Ok(found) => {
                    log::debug!("{operation}: found {} repositories", found.len());
                    expanded.extend(found.into_iter().map(|r| r.full_name));
                }
                Err(e) => log::error!("Failed to {operation}: {e}"),
            }
        }

        expanded.extend(repositories.iter().cloned());

        let mut seen = HashSet::new();
        expanded.retain(|repository| seen.insert(repository.clone()));
        expanded
    }
}

#[async_trait]
impl Provider for GithubClient {
    fn name(&self) -> &str {
        "GitHub"
    }

    async fn list_open_pull_requests(&self, repo: &RepoId, page: u32) -> Result<Page<PullRequest>> {
        let raw: Page<RawGithubPullRequest> = self
            .get_page(
                &format!("list GitHub pull requests of {repo}"),
                &format!("/repos/{}/{}/pulls", repo.owner, repo.name),
                vec![
                    ("state", "open".to_string()),
                    ("sort", "updated".to_string()),
                    ("direction", "desc".to_string()),
                    ("page", page.to_string()),
                ],
            )
            .await?;

        let repository = repo.to_string();
        Ok(Page {
            items: raw
                .items
                .into_iter()
                .map(|raw| {
                    let RawGithubPullRequest {
                        number,
                        title,
                        html_url,
                        updated_at,
                        user,
                        assignee,
                        draft,
                    } = raw;

                    PullRequest {
                        id: number,
                        author: user.login,
                        assignee: assignee.map(|a| a.login).filter(|a| !a.is_empty()),
                        repository: repository.clone(),
                        title,
                        web_link: html_url,
                        updated: updated_at,
                        requires_changes: false,
                        approved: false,
                        draft,
                    }
                })
                .collect(),
            next_page: raw.next_page,
        })
    }

    fn has_review_history(&self) -> bool {
        true
    }

    async fn list_review_transitions(
        &self,
        repo: &RepoId,
        id: u64,
        page: u32,
    ) -> Result<Page<Verdict>> {
        let raw: Page<RawGithubReview> = self
            .get_page(
                &format!("list GitHub reviews of {repo}#{id}"),
                &format!("/repos/{}/{}/pulls/{id}/reviews", repo.owner, repo.name),
                vec![("page", page.to_string())],
            )
            .await?;

        Ok(Page {
            items: raw
                .items
                .into_iter()
                .map(|review| Verdict::from_state(review.state))
                .collect(),
            next_page: raw.next_page,
        })
    }
}

/// Extracts the `page` query parameter of the `rel="next"` entry of a `Link` header.
pub(crate) fn next_page_from_link(link: &str) -> Option<u32> {
    link.split(',').find_map(|entry| {
        let (url, params) = entry.split_once(';')?;
        if !params.split(';').any(|p| p.trim() == r#"rel="next""#) {
            return None;
        }

        let url = url.trim().trim_start_matches('<').trim_end_matches('>');
        let (_, query) = url.split_once('?')?;
        query
            .split('&')
            .find_map(|pair| pair.strip_prefix("page="))
            .and_then(|page| page.parse().ok())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ProviderError;
    use crate::test_server::{serve, Reply};

    fn pull_json(number: u64, login: &str) -> String {
        format!(
            r#"{{"number": {number}, "title": "change {number}", "html_url": "https://github.com/o/r/pull/{number}", "updated_at": "2024-01-02T03:04:05Z", "user": {{"login": "{login}"}}, "assignee": {{"login": ""}}}}"#
        )
    }

    #[test]
    fn finds_next_page_in_link_header() {
        let link = r#"<https://api.github.com/repositories/1/pulls?state=open&page=3>; rel="next", <https://api.github.com/repositories/1/pulls?state=open&page=7>; rel="last""#;
        assert_eq!(next_page_from_link(link), Some(3));
    }

    #[test]
    fn last_page_has_no_next() {
        let link = r#"<https://api.github.com/repositories/1/pulls?page=1>; rel="first", <https://api.github.com/repositories/1/pulls?page=6>; rel="prev""#;
        assert_eq!(next_page_from_link(link), None);
        assert_eq!(next_page_from_link(""), None);
    }

    #[test]
    fn decodes_pull_request_listing() {
        let json = r#"[{
            "number": 42,
            "title": "Fix the thing",
            "html_url": "https://github.com/o/r/pull/42",
            "updated_at": "2024-01-02T03:04:05Z",
            "user": {"login": "jane"},
            "assignee": null,
            "draft": true
        }]"#;

        let raw: Vec<RawGithubPullRequest> = serde_json::from_str(json).unwrap();
        assert_eq!(raw[0].number, 42);
        assert_eq!(raw[0].user.login, "jane");
        assert!(raw[0].assignee.is_none());
        assert!(raw[0].draft);
    }

    #[tokio::test]
    async fn lists_open_pulls_across_link_pages() {
        let server = serve(|request_line| {
            if request_line.contains("page=2") {
                Reply::json(200, format!("[{}]", pull_json(2, "john")))
            } else {
                Reply::json(200, format!("[{}]", pull_json(1, "jane"))).header(
                    "Link",
                    r#"<https://api.github.com/repositories/1/pulls?state=open&page=2>; rel="next""#,
                )
            }
        })
        .await;
        let client = GithubClient::new("secret", &server.url);
        let repo = RepoId::parse("o/r").unwrap();

        let prs = collect_pages(|page| client.list_open_pull_requests(&repo, page))
            .await
            .unwrap();

        assert_eq!(prs.iter().map(|pr| pr.id).collect::<Vec<_>>(), vec![1, 2]);
        assert_eq!(prs[0].author, "jane");
        assert_eq!(prs[0].repository, "o/r");
        assert_eq!(prs[0].assignee, None, "empty assignee means unassigned");

        let requests = server.requests();
        assert_eq!(requests.len(), 2);
        for request in &requests {
            assert!(request.starts_with("GET /repos/o/r/pulls?"), "{request}");
            assert!(request.contains("state=open"));
            assert!(request.contains("sort=updated"));
            assert!(request.to_lowercase().contains("authorization: bearer secret"));
        }
        assert!(requests[0].contains("page=1"));
        assert!(requests[1].contains("page=2"));
    }

    #[tokio::test]
    async fn lists_review_verdicts_in_order() {
        let server = serve(|_| {
            Reply::json(
                200,
                r#"[{"state": "APPROVED"}, {"state": "COMMENTED"}, {"state": "CHANGES_REQUESTED"}]"#,
            )
        })
        .await;
        let client = GithubClient::new("secret", &server.url);
        let repo = RepoId::parse("o/r").unwrap();

        let page = client.list_review_transitions(&repo, 7, 1).await.unwrap();

        assert_eq!(
            page.items,
            vec![Verdict::Approved, Verdict::Other, Verdict::ChangesRequested]
        );
        assert_eq!(page.next_page, None);
        assert!(server.requests()[0].starts_with("GET /repos/o/r/pulls/7/reviews?page=1 "));
    }

    #[tokio::test]
    async fn error_status_is_reported() {
        let server = serve(|_| Reply::json(404, r#"{"message": "Not Found"}"#)).await;
        let client = GithubClient::new("secret", &server.url);
        let repo = RepoId::parse("o/missing").unwrap();

        let result = client.list_open_pull_requests(&repo, 1).await;

        match result {
            Err(ProviderError::UnexpectedStatus { status, body, .. }) => {
                assert_eq!(status, reqwest::StatusCode::NOT_FOUND);
                assert!(body.contains("Not Found"));
            }
            other => panic!("expected an unexpected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn expansion_keeps_each_repository_once() {
        let server = serve(|request_line| {
            if request_line.contains("/orgs/acme/repos") {
                Reply::json(200, r#"[{"full_name": "acme/a"}, {"full_name": "acme/b"}]"#)
            } else if request_line.contains("/users/jane/repos") {
                Reply::json(200, r#"[{"full_name": "acme/b"}, {"full_name": "jane/dots"}]"#)
            } else {
                Reply::json(404, "{}")
            }
        })
        .await;
        let client = GithubClient::new("secret", &server.url);

        let repositories = client
            .expand_repositories(
                &["acme".to_string(), "gone".to_string()],
                &["jane".to_string()],
                &["acme/a".to_string(), "other/c".to_string()],
            )
            .await;

        assert_eq!(repositories, vec!["acme/a", "acme/b", "jane/dots", "other/c"]);
    }
}
