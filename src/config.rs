use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::filters::FilterSettings;
use crate::providers::github;
use crate::slack::DEFAULT_MAX_LINES;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {underlying_error}")]
    Read {
        path: String,
        underlying_error: std::io::Error,
    },
    #[error("Could not parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("{variable} must be a number, got '{value}'")]
    InvalidNumber { variable: String, value: String },
    #[error("Invalid configuration:\n{}", .0.join("\n"))]
    Invalid(Vec<String>),
}

#[derive(Clone, Debug, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub github_token: String,
    pub github_url: String,
    pub github_organisations: Vec<String>,
    pub github_users: Vec<String>,
    pub github_repos: Vec<String>,
    pub gitlab_token: String,
    pub gitlab_url: String,
    pub gitlab_repos: Vec<String>,
    pub slack_token: String,
    pub slack_channel: String,
    pub max_lines: usize,
    pub filters: FilterSettings,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            github_token: String::new(),
            github_url: github::DEFAULT_API_URL.to_string(),
            github_organisations: vec![],
            github_users: vec![],
            github_repos: vec![],
            gitlab_token: String::new(),
            gitlab_url: String::new(),
            gitlab_repos: vec![],
            slack_token: String::new(),
            slack_channel: String::new(),
            max_lines: DEFAULT_MAX_LINES,
            filters: FilterSettings::default(),
        }
    }
}

pub const CONFIG_HELP: &str = "\
purr reads a TOML config file (--config or PURR_CONFIG) and the environment.

Example config file:

    github_token = \"secret_token\"
    github_organisations = [\"facebook\"]
    github_users = [\"stojg\"]
    github_repos = [\"user1/repo1\", \"user2/repo1\"]
    gitlab_token = \"secret_token\"
    gitlab_url = \"https://www.example.com\"
    gitlab_repos = [\"project1/repo1\", \"project2/repo1\"]
    slack_token = \"secret_token\"
    slack_channel = \"myteamchat\"
    max_lines = 30

    [filters]
    users = [\"jane\"]
    wip = true
    review = true

Every setting can be overridden with an environment variable:
GITHUB_TOKEN, GITHUB_URL, GITHUB_ORGANISATIONS, GITHUB_USERS, GITHUB_REPOS,
GITLAB_TOKEN, GITLAB_URL, GITLAB_REPOS, SLACK_TOKEN, SLACK_CHANNEL, MAX_LINES,
FILTER_USERS, FILTER_WIP, FILTER_REVIEW.
Lists are comma separated, booleans are 'true' or 'false'.";

fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

impl Config {
    /// Reads `path` if given, then applies environment overrides.
    pub fn load<P: AsRef<Path>>(path: Option<P>) -> Result<Config, ConfigError> {
        let mut config = match path {
            Some(path) => Config::from_file(path)?,
            None => Config::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.display().to_string(),
            underlying_error: e,
        })?;
        Ok(toml::from_str(&contents)?)
    }

    /// Overrides settings with any non-empty value `lookup` returns for the
    /// corresponding environment variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let strings = [
            ("GITHUB_TOKEN", &mut self.github_token),
            ("GITHUB_URL", &mut self.github_url),
            ("GITLAB_TOKEN", &mut self.gitlab_token),
            ("GITLAB_URL", &mut self.gitlab_url),
            ("SLACK_TOKEN", &mut self.slack_token),
            ("SLACK_CHANNEL", &mut self.slack_channel),
        ];
        for (name, field) in strings {
            if let Some(value) = non_empty(name) {
                *field = value;
            }
        }

        let lists = [
            ("GITHUB_ORGANISATIONS", &mut self.github_organisations),
            ("GITHUB_USERS", &mut self.github_users),
            ("GITHUB_REPOS", &mut self.github_repos),
            ("GITLAB_REPOS", &mut self.gitlab_repos),
            ("FILTER_USERS", &mut self.filters.users),
        ];
        for (name, field) in lists {
            if let Some(value) = non_empty(name) {
                *field = split_list(&value);
            }
        }

        let flags = [
            ("FILTER_WIP", &mut self.filters.wip),
            ("FILTER_REVIEW", &mut self.filters.review),
        ];
        for (name, field) in flags {
            if let Some(value) = non_empty(name) {
                *field = value == "true";
            }
        }

        if let Some(value) = non_empty("MAX_LINES") {
            self.max_lines = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidNumber {
                    variable: "MAX_LINES".to_string(),
                    value,
                })?;
        }

        Ok(())
    }

    /// Collects every problem with the settings. Slack settings are only
    /// required when the report goes to Slack.
    pub fn validate(&self, post_to_slack: bool) -> Result<(), ConfigError> {
        let mut errors = vec![];

        if post_to_slack && self.slack_token.is_empty() {
            errors.push("Slack token cannot be empty".to_string());
        }
        if post_to_slack && self.slack_channel.is_empty() {
            errors.push("Slack channel cannot be empty".to_string());
        }
        if !self.gitlab_repos.is_empty() && self.gitlab_url.is_empty() {
            errors.push("GitLab url cannot be empty when GitLab repos are configured".to_string());
        }
        if self.max_lines == 0 {
            errors.push("max_lines must be at least 1".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(errors))
        }
    }

    pub fn has_github_sources(&self) -> bool {
        !(self.github_organisations.is_empty()
            && self.github_users.is_empty()
            && self.github_repos.is_empty())
    }
}
