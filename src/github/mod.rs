//! GitHub API access: entity types, the listing trait the sync engine uses,
//! and the REST implementation of it.

mod client;
mod source;
pub mod types;

pub use client::GitHubClient;
pub use source::{IssueSource, Page, RepoRef};
