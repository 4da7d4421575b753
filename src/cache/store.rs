//! In-memory state of one mirrored project.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::intern::InternTable;
use crate::config::ProjectName;
use crate::github::types::{Commit, IssueData, Milestone, Repository, TimelineEvent, User};

/// An issue or pull request together with its backfilled history.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Issue {
  #[serde(flatten)]
  pub data: IssueData,
  /// `None` until fetched. An empty list means fetched and empty.
  #[serde(rename = "Timeline", default)]
  pub timeline: Option<Vec<TimelineEvent>>,
  /// Only fetched for pull requests.
  #[serde(rename = "Commits", default)]
  pub commits: Option<Vec<Commit>>,
}

impl Issue {
  pub fn number(&self) -> u64 {
    self.data.number
  }

  pub fn needs_commits(&self) -> bool {
    self.data.is_pull_request() && self.commits.is_none()
  }

  pub fn needs_timeline(&self) -> bool {
    self.timeline.is_none()
  }
}

/// Canonical in-memory records: issues by number, shared entities by id.
#[derive(Debug, Default)]
pub struct EntityStore {
  issues: BTreeMap<u64, Issue>,
  users: InternTable<User>,
  milestones: InternTable<Milestone>,
  repos: InternTable<Repository>,
}

impl EntityStore {
  pub fn new() -> Self {
    Self::default()
  }

  /// Store freshly listed issue fields.
  ///
  /// An existing record keeps its identity but loses its timeline and commits,
  /// since its history may have changed. Returns true if the issue is new.
  pub fn upsert_listed(&mut self, data: IssueData) -> bool {
    let mut issue = Issue {
      data,
      timeline: None,
      commits: None,
    };
    self.intern_issue(&mut issue);

    match self.issues.get_mut(&issue.number()) {
      Some(existing) => {
        *existing = issue;
        false
      }
      None => {
        self.issues.insert(issue.number(), issue);
        true
      }
    }
  }

  /// Insert a complete record (e.g. one read from disk), interning it first.
  pub fn insert(&mut self, mut issue: Issue) {
    self.intern_issue(&mut issue);
    self.issues.insert(issue.number(), issue);
  }

  pub fn get(&self, number: u64) -> Option<&Issue> {
    self.issues.get(&number)
  }

  pub fn get_mut(&mut self, number: u64) -> Option<&mut Issue> {
    self.issues.get_mut(&number)
  }

  /// Issue numbers in ascending order.
  pub fn numbers(&self) -> Vec<u64> {
    self.issues.keys().copied().collect()
  }

  pub fn issues(&self) -> impl Iterator<Item = &Issue> {
    self.issues.values()
  }

  pub fn len(&self) -> usize {
    self.issues.len()
  }

  pub fn is_empty(&self) -> bool {
    self.issues.is_empty()
  }

  pub fn users(&self) -> &InternTable<User> {
    &self.users
  }

  pub fn milestones(&self) -> &InternTable<Milestone> {
    &self.milestones
  }

  pub fn repos(&self) -> &InternTable<Repository> {
    &self.repos
  }

  /// Replace every user, milestone and repository reference in `issue` with
  /// the canonical instance, including those inside its timeline and commits.
  pub fn intern_issue(&mut self, issue: &mut Issue) {
    let data = &mut issue.data;
    self.users.intern_opt(&mut data.user);
    self.users.intern_opt(&mut data.assignee);
    self.users.intern_opt(&mut data.closed_by);
    for assignee in &mut data.assignees {
      self.users.intern(assignee);
    }
    self.milestones.intern_opt(&mut data.milestone);
    self.repos.intern_opt(&mut data.repository);

    for event in issue.timeline.iter_mut().flatten() {
      self.users.intern_opt(&mut event.actor);
      self.users.intern_opt(&mut event.assignee);
      self.milestones.intern_opt(&mut event.milestone);
    }

    for commit in issue.commits.iter_mut().flatten() {
      self.users.intern_opt(&mut commit.author);
      self.users.intern_opt(&mut commit.committer);
    }
  }

  /// Re-intern the stored issue `number` in place.
  pub fn reintern(&mut self, number: u64) {
    if let Some(mut issue) = self.issues.remove(&number) {
      self.intern_issue(&mut issue);
      self.issues.insert(number, issue);
    }
  }
}

/// One mirrored GitHub project.
#[derive(Debug)]
pub struct Project {
  pub name: ProjectName,
  /// Watermark for incremental listing. `None` means never refreshed.
  pub refreshed_at: Option<DateTime<Utc>>,
  pub store: EntityStore,
}

impl Project {
  pub fn new(name: ProjectName) -> Self {
    Self {
      name,
      refreshed_at: None,
      store: EntityStore::new(),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::github::types::PullRequestLinks;
  use std::sync::Arc;

  fn user(id: u64) -> Arc<User> {
    Arc::new(User {
      id,
      login: format!("user{}", id),
      ..Default::default()
    })
  }

  fn listed(number: u64, title: &str) -> IssueData {
    IssueData {
      id: number * 10,
      number,
      title: title.to_string(),
      state: "open".to_string(),
      user: Some(user(1)),
      ..Default::default()
    }
  }

  #[test]
  fn test_upsert_creates_then_updates_in_place() {
    let mut store = EntityStore::new();
    assert!(store.upsert_listed(listed(5, "first")));
    assert!(!store.upsert_listed(listed(5, "second")));

    assert_eq!(store.len(), 1);
    assert_eq!(store.get(5).unwrap().data.title, "second");
  }

  #[test]
  fn test_upsert_clears_backfill() {
    let mut store = EntityStore::new();
    store.upsert_listed(listed(5, "first"));
    {
      let issue = store.get_mut(5).unwrap();
      issue.timeline = Some(vec![TimelineEvent::default()]);
      issue.commits = Some(vec![Commit::default()]);
    }

    store.upsert_listed(listed(5, "edited"));

    let issue = store.get(5).unwrap();
    assert!(issue.timeline.is_none());
    assert!(issue.commits.is_none());
  }

  #[test]
  fn test_numbers_ascending() {
    let mut store = EntityStore::new();
    for n in [42, 7, 100, 8] {
      store.upsert_listed(listed(n, "x"));
    }
    assert_eq!(store.numbers(), vec![7, 8, 42, 100]);
  }

  #[test]
  fn test_intern_issue_shares_users_everywhere() {
    let mut store = EntityStore::new();
    let mut issue = Issue {
      data: IssueData {
        number: 1,
        user: Some(user(1)),
        assignee: Some(user(2)),
        assignees: vec![user(2), user(3)],
        closed_by: Some(user(1)),
        ..Default::default()
      },
      timeline: Some(vec![TimelineEvent {
        actor: Some(user(3)),
        assignee: Some(user(2)),
        ..Default::default()
      }]),
      commits: Some(vec![Commit {
        author: Some(user(1)),
        committer: Some(user(3)),
        ..Default::default()
      }]),
    };

    store.intern_issue(&mut issue);
    let snapshot = issue.clone();
    store.intern_issue(&mut issue);

    assert_eq!(store.users().len(), 3);
    let canonical = |id| Arc::clone(store.users().get(id).unwrap());
    assert!(Arc::ptr_eq(issue.data.user.as_ref().unwrap(), &canonical(1)));
    assert!(Arc::ptr_eq(issue.data.closed_by.as_ref().unwrap(), &canonical(1)));
    assert!(Arc::ptr_eq(&issue.data.assignees[0], &canonical(2)));
    let event = &issue.timeline.as_ref().unwrap()[0];
    assert!(Arc::ptr_eq(event.actor.as_ref().unwrap(), &canonical(3)));
    let commit = &issue.commits.as_ref().unwrap()[0];
    assert!(Arc::ptr_eq(commit.author.as_ref().unwrap(), &canonical(1)));
    assert_eq!(issue, snapshot);
  }

  #[test]
  fn test_entities_shared_across_issues() {
    let mut store = EntityStore::new();
    store.upsert_listed(listed(1, "a"));
    store.upsert_listed(listed(2, "b"));

    let a = store.get(1).unwrap().data.user.clone().unwrap();
    let b = store.get(2).unwrap().data.user.clone().unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(store.users().len(), 1);
  }

  #[test]
  fn test_backfill_needs() {
    let mut issue = Issue::default();
    assert!(issue.needs_timeline());
    assert!(!issue.needs_commits());

    issue.data.pull_request = Some(PullRequestLinks::default());
    assert!(issue.needs_commits());

    issue.timeline = Some(Vec::new());
    issue.commits = Some(Vec::new());
    assert!(!issue.needs_timeline());
    assert!(!issue.needs_commits());
  }
}
