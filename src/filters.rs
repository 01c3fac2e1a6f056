use purr_core::PullRequest;
use serde::Deserialize;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::trawler::HANDOFF_CAPACITY;

/// A pass/fail rule applied to every pull request.
pub trait Policy: Send {
    fn name(&self) -> &str;

    /// Returns true if the pull request should be kept.
    fn accept(&self, pr: &PullRequest) -> bool;
}

/// Keeps pull requests authored by or assigned to one of the listed users.
/// An empty list keeps everything.
#[derive(Clone, Debug, Default)]
pub struct UserAllowList(pub Vec<String>);

impl Policy for UserAllowList {
    fn name(&self) -> &str {
        "users"
    }

    fn accept(&self, pr: &PullRequest) -> bool {
        let UserAllowList(users) = self;
        users.is_empty()
            || users
                .iter()
                .any(|user| *user == pr.author || pr.assignee.as_ref() == Some(user))
    }
}

/// Drops drafts and pull requests whose title starts with `[WIP]` or `WIP`.
#[derive(Clone, Copy, Debug)]
pub struct WorkInProgress {
    pub enabled: bool,
}

impl Policy for WorkInProgress {
    fn name(&self) -> &str {
        "wip"
    }

    fn accept(&self, pr: &PullRequest) -> bool {
        if !self.enabled {
            return true;
        }

        !(pr.draft || pr.title.starts_with("[WIP]") || pr.title.starts_with("WIP"))
    }
}

/// Drops pull requests whose latest review requested changes.
#[derive(Clone, Copy, Debug)]
pub struct ReviewPolicy {
    pub enabled: bool,
}

impl Policy for ReviewPolicy {
    fn name(&self) -> &str {
        "review"
    }

    fn accept(&self, pr: &PullRequest) -> bool {
        !self.enabled || !pr.requires_changes
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
pub struct FilterSettings {
    #[serde(default)]
    pub users: Vec<String>,
    #[serde(default = "enabled")]
    pub wip: bool,
    #[serde(default = "enabled")]
    pub review: bool,
}

fn enabled() -> bool {
    true
}

impl Default for FilterSettings {
    fn default() -> Self {
        FilterSettings {
            users: vec![],
            wip: true,
            review: true,
        }
    }
}

/// Ordered policies plus a count of the pull requests they rejected.
#[derive(Default)]
pub struct FilterChain {
    policies: Vec<Box<dyn Policy>>,
    rejected: usize,
}

impl From<&FilterSettings> for FilterChain {
    fn from(settings: &FilterSettings) -> Self {
        FilterChain::new()
            .with(UserAllowList(settings.users.clone()))
            .with(WorkInProgress {
                enabled: settings.wip,
            })
            .with(ReviewPolicy {
                enabled: settings.review,
            })
    }
}

impl FilterChain {
    pub fn new() -> FilterChain {
        FilterChain::default()
    }

    pub fn with<P: Policy + 'static>(mut self, policy: P) -> FilterChain {
        self.push(policy);
        self
    }

    pub fn push<P: Policy + 'static>(&mut self, policy: P) {
        self.policies.push(Box::new(policy));
    }

    /// True if every policy accepts `pr`. Stops at the first rejection and counts it.
    pub fn accept(&mut self, pr: &PullRequest) -> bool {
        match self.policies.iter().find(|policy| !policy.accept(pr)) {
            Some(policy) => {
                log::debug!(
                    "filtered pr '{}' ({}#{}) by {}",
                    pr.title,
                    pr.repository,
                    pr.id,
                    policy.name()
                );
                self.rejected += 1;
                false
            }
            None => true,
        }
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }
}

/// Runs `chain` over everything arriving on `input` in its own task.
///
/// The task is the chain's only user. It hands the chain back, rejection count
/// included, once `input` closes.
pub fn spawn_filter(
    mut chain: FilterChain,
    mut input: mpsc::Receiver<PullRequest>,
) -> (mpsc::Receiver<PullRequest>, JoinHandle<FilterChain>) {
    let (tx, rx) = mpsc::channel(HANDOFF_CAPACITY);

    let handle = tokio::spawn(async move {
        while let Some(pr) = input.recv().await {
            if chain.accept(&pr) && tx.send(pr).await.is_err() {
                log::debug!("Filtered receiver went away");
                break;
            }
        }
        chain
    });

    (rx, handle)
}
