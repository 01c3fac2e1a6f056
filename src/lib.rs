pub mod config;
pub mod filters;
pub mod humanize;
pub mod merge;
pub mod pipeline;
pub mod providers;
pub mod report;
pub mod slack;
pub mod trawler;

#[cfg(test)]
mod test_server;

pub use config::Config;
pub use filters::{FilterChain, Policy};
pub use pipeline::{run, Source};
pub use purr_core::{PullRequest, ReviewState, Verdict};
pub use report::Report;
