use std::collections::BTreeMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};
use purr_core::PullRequest;
use tokio::sync::mpsc;

use crate::humanize::relative_time;

/// Accepted pull requests grouped by repository, plus the summary figures the
/// message needs.
#[derive(Debug, Default)]
pub struct Report {
    repositories: BTreeMap<String, Vec<PullRequest>>,
    oldest: Option<PullRequest>,
    accepted: usize,
    rejected: usize,
}

impl Report {
    /// Drains `input` until it closes.
    pub async fn collect(mut input: mpsc::Receiver<PullRequest>) -> Report {
        let mut report = Report::default();
        while let Some(pr) = input.recv().await {
            report.observe(pr);
        }
        report
    }

    pub fn observe(&mut self, pr: PullRequest) {
        let is_older = self
            .oldest
            .as_ref()
            .map(|oldest| pr.updated < oldest.updated)
            .unwrap_or(true);
        if is_older {
            self.oldest = Some(pr.clone());
        }

        self.accepted += 1;
        self.repositories
            .entry(pr.repository.clone())
            .or_default()
            .push(pr);
    }

    pub fn set_rejected(&mut self, rejected: usize) {
        self.rejected = rejected;
    }

    pub fn repositories(&self) -> &BTreeMap<String, Vec<PullRequest>> {
        &self.repositories
    }

    pub fn oldest(&self) -> Option<&PullRequest> {
        self.oldest.as_ref()
    }

    pub fn accepted(&self) -> usize {
        self.accepted
    }

    pub fn rejected(&self) -> usize {
        self.rejected
    }

    /// Renders the Slack message. Nothing accepted renders as the empty string.
    pub fn render(&self, now: DateTime<Utc>) -> String {
        let Some(oldest) = &self.oldest else {
            return String::new();
        };

        let mut message = String::new();
        for (repository, prs) in &self.repositories {
            let _ = writeln!(message, "*{repository}*");
            for pr in prs {
                let _ = writeln!(message, "{}", render_line(pr, now));
            }
            message.push('\n');
        }

        let _ = writeln!(
            message,
            "\nThere are currently {} open pull requests and the oldest (<{}|PR #{}>) was updated {}",
            self.accepted,
            oldest.web_link,
            oldest.id,
            relative_time(oldest.updated, now)
        );
        let _ = writeln!(message, "{} pull requests were filtered out", self.rejected);

        message
    }
}

pub fn render_line(pr: &PullRequest, now: DateTime<Utc>) -> String {
    let mut line = format!(
        " • <{}|#{}> {} - _{}_",
        pr.web_link,
        pr.id,
        escape(&pr.title),
        pr.author
    );
    if pr.approved {
        line.push_str(", *APPROVED*");
    }
    if let Some(assignee) = &pr.assignee {
        let _ = write!(line, ", assigned to _{assignee}_");
    }
    let _ = write!(line, " - updated {}", relative_time(pr.updated, now));
    line
}

/// Escapes the characters Slack treats as control sequences. `&` goes first.
pub fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}
