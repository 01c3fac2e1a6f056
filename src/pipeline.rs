use std::sync::Arc;

use thiserror::Error;

use crate::config::Config;
use crate::filters::{spawn_filter, FilterChain};
use crate::merge::merge;
use crate::providers::{GithubClient, GitlabClient, Provider};
use crate::report::Report;
use crate::trawler::trawl;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Filter stage stopped unexpectedly: {0}")]
    FilterStage(#[from] tokio::task::JoinError),
}

/// A provider and the repositories to trawl on it.
pub struct Source {
    pub provider: Arc<dyn Provider>,
    pub repositories: Vec<String>,
}

/// Builds the sources described by `config`, expanding GitHub organisations
/// and users into repositories.
pub async fn sources_from_config(config: &Config) -> Vec<Source> {
    let mut sources = vec![];

    if config.has_github_sources() {
        let client = GithubClient::new(config.github_token.clone(), &config.github_url);
        let repositories = client
            .expand_repositories(
                &config.github_organisations,
                &config.github_users,
                &config.github_repos,
            )
            .await;
        sources.push(Source {
            provider: Arc::new(client),
            repositories,
        });
    }

    if !config.gitlab_repos.is_empty() {
        sources.push(Source {
            provider: Arc::new(GitlabClient::new(
                config.gitlab_token.clone(),
                &config.gitlab_url,
            )),
            repositories: config.gitlab_repos.clone(),
        });
    }

    sources
}

/// Trawls every source concurrently, merges the results, filters them through
/// `chain` and collects the survivors into a report.
pub async fn run(sources: Vec<Source>, chain: FilterChain) -> Result<Report, PipelineError> {
    let streams = sources
        .into_iter()
        .map(|source| {
            log::info!(
                "Trawling {} repositories on {}",
                source.repositories.len(),
                source.provider.name()
            );
            trawl(source.provider, source.repositories)
        })
        .collect();

    let (filtered, filter) = spawn_filter(chain, merge(streams));
    let mut report = Report::collect(filtered).await;
    let chain = filter.await?;
    report.set_rejected(chain.rejected());

    log::info!(
        "Found {} open pull requests, filtered out {}",
        report.accepted(),
        report.rejected()
    );

    Ok(report)
}
