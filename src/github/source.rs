//! The paginated listing capability the sync engine is written against.

use chrono::{DateTime, Utc};
use color_eyre::Result;

use super::types::{Commit, IssueData, TimelineEvent};

/// One page of a listing.
#[derive(Debug, Clone)]
pub struct Page<T> {
  pub items: Vec<T>,
  /// Number of the page after this one, or 0 when this is the last page.
  pub next_page: u32,
}

impl<T> Page<T> {
  /// Whether another page should be requested after `requested`.
  pub fn continues_after(&self, requested: u32) -> bool {
    self.next_page > requested
  }
}

/// Which repository a request targets.
#[derive(Debug, Clone, Copy)]
pub struct RepoRef<'a> {
  pub owner: &'a str,
  pub repo: &'a str,
}

/// Source of issue, timeline and pull-request commit listings.
///
/// Requests are issued one at a time; implementations need not be thread-safe.
#[allow(async_fn_in_trait)]
pub trait IssueSource {
  /// All issues and pull requests, oldest first, updated at or after `since`.
  async fn list_issues(
    &self,
    repo: RepoRef<'_>,
    since: Option<DateTime<Utc>>,
    page: u32,
    per_page: u32,
  ) -> Result<Page<IssueData>>;

  async fn list_timeline(
    &self,
    repo: RepoRef<'_>,
    number: u64,
    page: u32,
    per_page: u32,
  ) -> Result<Page<TimelineEvent>>;

  async fn list_pr_commits(
    &self,
    repo: RepoRef<'_>,
    number: u64,
    page: u32,
    per_page: u32,
  ) -> Result<Page<Commit>>;
}
