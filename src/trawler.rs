use std::collections::HashSet;
use std::sync::Arc;

use purr_core::{PullRequest, ReviewState};
use tokio::sync::mpsc;

use crate::providers::{collect_pages, Provider, RepoId};

/// Capacity of every pipeline channel. Producers wait on the consumer rather
/// than buffering.
pub const HANDOFF_CAPACITY: usize = 1;

/// Spawns one task per repository that lists its open pull requests on
/// `provider` and sends them on the returned channel.
///
/// Every spawned task owns a clone of the sender, so the channel closes once the
/// last repository (and the last review lookup) has finished. Malformed
/// repository names are logged and skipped, repeated ones are trawled once.
pub fn trawl(provider: Arc<dyn Provider>, repositories: Vec<String>) -> mpsc::Receiver<PullRequest> {
    let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);
    let mut seen = HashSet::new();

    for repository in repositories {
        let repo = match RepoId::parse(&repository) {
            Ok(repo) => repo,
            Err(e) => {
                log::error!("Skipping {} repository: {e}", provider.name());
                continue;
            }
        };
        if !seen.insert(repo.clone()) {
            log::debug!("{} repo {repo} listed more than once", provider.name());
            continue;
        }

        tokio::spawn(trawl_repository(provider.clone(), repo, tx.clone()));
    }

    rx
}

async fn trawl_repository(
    provider: Arc<dyn Provider>,
    repo: RepoId,
    tx: mpsc::Sender<PullRequest>,
) {
    log::debug!("Fetching open pull requests for {} repo {repo}", provider.name());

    let pull_requests =
        match collect_pages(|page| provider.list_open_pull_requests(&repo, page)).await {
            Ok(pull_requests) => pull_requests,
            Err(e) => {
                log::error!(
                    "Couldn't fetch pull requests from {} ({repo}): {e}",
                    provider.name()
                );
                return;
            }
        };

    log::debug!(
        "Found {} open pull requests in {} repo {repo}",
        pull_requests.len(),
        provider.name()
    );

    for pull_request in pull_requests {
        if provider.has_review_history() {
            tokio::spawn(enrich_and_send(
                provider.clone(),
                repo.clone(),
                pull_request,
                tx.clone(),
            ));
        } else if tx.send(pull_request).await.is_err() {
            log::debug!("Receiver for {repo} went away, stopping");
            return;
        }
    }
}

async fn enrich_and_send(
    provider: Arc<dyn Provider>,
    repo: RepoId,
    pull_request: PullRequest,
    tx: mpsc::Sender<PullRequest>,
) {
    let id = pull_request.id;
    // an unknown review history leaves both flags clear
    let state =
        match collect_pages(|page| provider.list_review_transitions(&repo, id, page)).await {
            Ok(verdicts) => ReviewState::from_verdicts(verdicts),
            Err(e) => {
                log::error!(
                    "Couldn't fetch reviews from {} ({repo}#{id}): {e}",
                    provider.name()
                );
                ReviewState::default()
            }
        };

    if tx.send(pull_request.with_review_state(state)).await.is_err() {
        log::debug!("Receiver for {repo}#{id} went away");
    }
}
