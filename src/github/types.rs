//! Serde types matching GitHub REST API responses.
//!
//! The same types are written to the on-disk cache, so every field that is
//! read from the API must also survive a save/load cycle. Users, milestones
//! and repositories are held behind `Arc` so the cache layer can intern them.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// Shared entities (interned by id)
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct User {
  pub id: u64,
  pub login: String,
  #[serde(rename = "type")]
  pub kind: Option<String>,
  pub site_admin: bool,
  pub html_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Milestone {
  /// Zero for the title-only milestones embedded in timeline events.
  pub id: u64,
  pub number: u64,
  pub title: String,
  pub state: Option<String>,
  pub open_issues: u64,
  pub closed_issues: u64,
  pub due_on: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Repository {
  pub id: u64,
  pub name: String,
  pub full_name: String,
  pub private: bool,
}

// ============================================================================
// Issue listing fields
// ============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Label {
  pub id: u64,
  pub name: String,
  pub color: String,
}

/// Present on an issue only when it is a pull request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PullRequestLinks {
  pub url: Option<String>,
  pub html_url: Option<String>,
  pub diff_url: Option<String>,
  pub patch_url: Option<String>,
}

/// Fields returned by the issue listing endpoint.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IssueData {
  pub id: u64,
  pub number: u64,
  pub title: String,
  pub state: String,
  pub body: Option<String>,
  pub locked: bool,
  pub comments: u64,
  pub user: Option<Arc<User>>,
  pub assignee: Option<Arc<User>>,
  pub assignees: Vec<Arc<User>>,
  pub closed_by: Option<Arc<User>>,
  pub labels: Vec<Label>,
  pub milestone: Option<Arc<Milestone>>,
  pub repository: Option<Arc<Repository>>,
  pub pull_request: Option<PullRequestLinks>,
  pub created_at: Option<DateTime<Utc>>,
  pub updated_at: Option<DateTime<Utc>>,
  pub closed_at: Option<DateTime<Utc>>,
  pub html_url: Option<String>,
}

impl IssueData {
  pub fn is_pull_request(&self) -> bool {
    self.pull_request.is_some()
  }
}

// ============================================================================
// Backfill data
// ============================================================================

/// One entry of an issue's timeline.
///
/// Timeline entries are heterogeneous; only the fields shared by the common
/// event kinds are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimelineEvent {
  pub id: Option<u64>,
  pub event: String,
  pub actor: Option<Arc<User>>,
  pub assignee: Option<Arc<User>>,
  pub milestone: Option<Arc<Milestone>>,
  pub label: Option<Label>,
  pub commit_id: Option<String>,
  pub state: Option<String>,
  pub body: Option<String>,
  pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitSignature {
  pub name: String,
  pub email: String,
  pub date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GitCommit {
  pub message: String,
  pub author: Option<GitSignature>,
  pub committer: Option<GitSignature>,
}

/// A commit on a pull request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Commit {
  pub sha: String,
  pub commit: Option<GitCommit>,
  /// GitHub account of the git author, when GitHub could match one.
  pub author: Option<Arc<User>>,
  pub committer: Option<Arc<User>>,
  pub html_url: Option<String>,
}
