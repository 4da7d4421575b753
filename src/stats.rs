//! Aggregate statistics over the mirrored issues.

use std::collections::BTreeMap;
use std::fmt;

use crate::cache::{EntityStore, Issue};

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// Distribution of closed pull-request ages, in whole days.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgeStats {
  /// Number of pull requests per age in days.
  pub histogram: BTreeMap<u64, u64>,
  pub count: u64,
  pub mean: f64,
  pub stddev: f64,
  sum: u64,
  sum_sq: u64,
}

impl AgeStats {
  pub fn record(&mut self, days: u64) {
    *self.histogram.entry(days).or_default() += 1;
    self.count += 1;
    self.sum += days;
    self.sum_sq += days * days;

    let n = self.count as f64;
    self.mean = self.sum as f64 / n;
    let variance = self.sum_sq as f64 / n - self.mean * self.mean;
    self.stddev = variance.max(0.0).sqrt();
  }
}

impl fmt::Display for AgeStats {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(
      f,
      "age: mean={:.1} stddev={:.1} (n={})",
      self.mean, self.stddev, self.count
    )
  }
}

/// Age of a closed pull request in days, rounded up, at least 1.
///
/// Returns `None` for plain issues and for pull requests that are still open.
pub fn closed_age_days(issue: &Issue) -> Option<u64> {
  let data = &issue.data;
  if !data.is_pull_request() {
    return None;
  }
  let closed = data.closed_at?;
  let created = data.created_at?;
  let secs = (closed - created).num_seconds().max(0);
  let days = (secs + SECONDS_PER_DAY - 1) / SECONDS_PER_DAY;
  Some(days.max(1) as u64)
}

pub fn closed_pr_ages<'a>(issues: impl IntoIterator<Item = &'a Issue>) -> AgeStats {
  let mut stats = AgeStats::default();
  for days in issues.into_iter().filter_map(closed_age_days) {
    stats.record(days);
  }
  stats
}

/// How many distinct records of each kind the store holds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntityCounts {
  pub users: usize,
  pub milestones: usize,
  pub repos: usize,
  pub issues: usize,
  pub pull_requests: usize,
}

impl EntityCounts {
  pub fn of(store: &EntityStore) -> Self {
    let pull_requests = store.issues().filter(|i| i.data.is_pull_request()).count();
    Self {
      users: store.users().len(),
      milestones: store.milestones().len(),
      repos: store.repos().len(),
      issues: store.len() - pull_requests,
      pull_requests,
    }
  }
}
