use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A provider agnostic open pull request (or merge request).
#[derive(Clone, Deserialize, Serialize, Debug, PartialEq, Eq)]
pub struct PullRequest {
    pub id: u64,
    pub author: String,
    pub assignee: Option<String>,
    pub repository: String,
    pub title: String,
    pub web_link: String,
    pub updated: DateTime<Utc>,
    pub requires_changes: bool,
    pub approved: bool,
    pub draft: bool,
}

impl PullRequest {
    pub fn with_review_state(self, state: ReviewState) -> PullRequest {
        let ReviewState {
            requires_changes,
            approved,
        } = state;

        PullRequest {
            requires_changes,
            approved,
            ..self
        }
    }
}

/// Outcome of a single submitted review.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Verdict {
    ChangesRequested,
    Approved,
    Other,
}

impl Verdict {
    pub fn from_state<S: AsRef<str>>(state: S) -> Verdict {
        match state.as_ref() {
            "CHANGES_REQUESTED" => Verdict::ChangesRequested,
            "APPROVED" => Verdict::Approved,
            _ => Verdict::Other,
        }
    }
}

/// Review flags derived from the most recent deciding verdict.
///
/// `requires_changes` and `approved` are never both set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReviewState {
    pub requires_changes: bool,
    pub approved: bool,
}

impl ReviewState {
    pub fn apply(self, verdict: Verdict) -> ReviewState {
        match verdict {
            Verdict::ChangesRequested => ReviewState {
                requires_changes: true,
                approved: false,
            },
            Verdict::Approved => ReviewState {
                requires_changes: false,
                approved: true,
            },
            Verdict::Other => self,
        }
    }

    /// Folds verdicts in the order given; they must be chronological.
    pub fn from_verdicts<I: IntoIterator<Item = Verdict>>(verdicts: I) -> ReviewState {
        verdicts
            .into_iter()
            .fold(ReviewState::default(), ReviewState::apply)
    }
}
