//! Incremental sync of one project against the GitHub listing API.
//!
//! A refresh runs two phases:
//! 1. Listing: every issue updated since the watermark is fetched, stored and
//!    saved with its history cleared. Fetch errors are retried forever. The
//!    watermark and metadata are saved once listing completes.
//! 2. Backfill: newest issue first, any issue missing its timeline (or, for a
//!    pull request, its commits) has them fetched and is saved immediately.
//!    Fetch errors end the run; everything saved so far stays valid.

use chrono::Utc;
use color_eyre::Result;
use std::future::Future;
use std::time::Duration;
use tracing::info;

use super::policy::FetchPolicy;
use crate::cache::{CacheStorage, Project};
use crate::config::Config;
use crate::github::types::{Commit, IssueData, TimelineEvent};
use crate::github::{IssueSource, Page, RepoRef};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Clone, Copy)]
pub struct SyncOptions {
  pub per_page: u32,
  /// Delay between attempts when listing fails.
  pub retry_delay: Duration,
}

impl From<&Config> for SyncOptions {
  fn from(config: &Config) -> Self {
    Self {
      per_page: config.per_page,
      retry_delay: config.retry_delay,
    }
  }
}

/// Counters for one refresh.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
  pub listed: usize,
  pub created: usize,
  pub backfilled: usize,
  pub events: usize,
  pub commits: usize,
}

pub struct Syncer<'a, C, S> {
  client: &'a C,
  storage: &'a S,
  options: SyncOptions,
}

impl<'a, C: IssueSource, S: CacheStorage> Syncer<'a, C, S> {
  pub fn new(client: &'a C, storage: &'a S, options: SyncOptions) -> Self {
    Self {
      client,
      storage,
      options,
    }
  }

  fn listing_policy(&self) -> FetchPolicy {
    FetchPolicy::RetryForever {
      delay: self.options.retry_delay,
    }
  }

  fn backfill_policy(&self) -> FetchPolicy {
    FetchPolicy::Abort
  }

  /// Run the listing phase then the backfill phase.
  pub async fn refresh(&self, project: &mut Project) -> Result<SyncReport> {
    let mut report = SyncReport::default();
    self.list_issues(project, &mut report).await?;
    self.backfill(project, &mut report).await?;
    Ok(report)
  }

  /// Fetch and save every issue changed since the watermark, then advance the
  /// watermark to when this listing started and save the project metadata.
  pub async fn list_issues(&self, project: &mut Project, report: &mut SyncReport) -> Result<()> {
    match project.refreshed_at {
      Some(at) => info!("refreshing issues since @ {}", at.format(TIME_FORMAT)),
      None => info!("loading issues"),
    }

    // Taken before the first request so changes made during listing are seen
    // again next time.
    let start = Utc::now();
    let since = project.refreshed_at;
    let name = project.name.clone();
    let repo = RepoRef {
      owner: &name.owner,
      repo: &name.repo,
    };
    let client = self.client;
    let per_page = self.options.per_page;
    let storage = self.storage;
    let store = &mut project.store;

    paginate(
      self.listing_policy(),
      "issues",
      move |page| client.list_issues(repo, since, page, per_page),
      |issues: Vec<IssueData>| {
        if let (Some(first), Some(last)) = (issues.first(), issues.last()) {
          info!("  {:3}: {}-{}", issues.len(), first.number, last.number);
        }
        for data in issues {
          let number = data.number;
          report.listed += 1;
          if store.upsert_listed(data) {
            report.created += 1;
          }
          if let Some(issue) = store.get(number) {
            storage.save_issue(issue)?;
          }
        }
        Ok(())
      },
    )
    .await?;

    project.refreshed_at = Some(start);
    self.storage.save_meta(project)?;
    info!("  done");

    Ok(())
  }

  /// Fetch missing timelines and pull-request commits, newest issue first,
  /// saving each issue as soon as it is complete.
  pub async fn backfill(&self, project: &mut Project, report: &mut SyncReport) -> Result<()> {
    info!("refreshing timelines");

    let name = project.name.clone();
    let repo = RepoRef {
      owner: &name.owner,
      repo: &name.repo,
    };
    let client = self.client;
    let per_page = self.options.per_page;

    for number in project.store.numbers().into_iter().rev() {
      let (want_commits, want_timeline) = match project.store.get(number) {
        Some(issue) => (issue.needs_commits(), issue.needs_timeline()),
        None => continue,
      };
      if !want_commits && !want_timeline {
        continue;
      }

      let mut commits = None;
      if want_commits {
        let mut all = Vec::new();
        paginate(
          self.backfill_policy(),
          &format!("commits of #{}", number),
          move |page| client.list_pr_commits(repo, number, page, per_page),
          |page: Vec<Commit>| {
            all.extend(page);
            Ok(())
          },
        )
        .await?;
        commits = Some(all);
      }

      let mut timeline = None;
      if want_timeline {
        let mut all = Vec::new();
        paginate(
          self.backfill_policy(),
          &format!("timeline of #{}", number),
          move |page| client.list_timeline(repo, number, page, per_page),
          |page: Vec<TimelineEvent>| {
            all.extend(page);
            Ok(())
          },
        )
        .await?;
        timeline = Some(all);
      }

      if let Some(issue) = project.store.get_mut(number) {
        if let Some(commits) = commits {
          report.commits += commits.len();
          issue.commits = Some(commits);
        }
        if let Some(timeline) = timeline {
          report.events += timeline.len();
          issue.timeline = Some(timeline);
        }
      }
      project.store.reintern(number);

      if let Some(issue) = project.store.get(number) {
        info!(
          "  {} ({} commits, {} events)",
          number,
          issue.commits.as_ref().map_or(0, Vec::len),
          issue.timeline.as_ref().map_or(0, Vec::len)
        );
        self.storage.save_issue(issue)?;
        report.backfilled += 1;
      }
    }

    info!("  done");
    Ok(())
  }
}

/// Request pages starting at 1 until the reported next page stops advancing,
/// handing each page's items to `on_page`. Failed requests go to `policy`;
/// errors from `on_page` always end the loop.
async fn paginate<T, F, Fut, P>(
  policy: FetchPolicy,
  what: &str,
  mut fetch: F,
  mut on_page: P,
) -> Result<()>
where
  F: FnMut(u32) -> Fut,
  Fut: Future<Output = Result<Page<T>>>,
  P: FnMut(Vec<T>) -> Result<()>,
{
  let mut page = 1;
  loop {
    let listing = match fetch(page).await {
      Ok(listing) => listing,
      Err(err) => {
        policy.recover(err, what, page).await?;
        continue;
      }
    };

    let more = listing.continues_after(page);
    let next = listing.next_page;
    on_page(listing.items)?;

    if !more {
      return Ok(());
    }
    page = next;
  }
}
