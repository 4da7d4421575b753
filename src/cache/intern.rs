//! Interning of entities that many records refer to by id.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::trace;

use crate::github::types::{Milestone, Repository, User};

/// Trait for entities that are shared by id across the object graph.
pub trait Entity {
  /// Numeric id assigned by GitHub. Zero means unset.
  fn id(&self) -> u64;

  /// Entity type name for logging (e.g., "user", "milestone")
  fn kind() -> &'static str;
}

impl Entity for User {
  fn id(&self) -> u64 {
    self.id
  }

  fn kind() -> &'static str {
    "user"
  }
}

impl Entity for Milestone {
  fn id(&self) -> u64 {
    self.id
  }

  fn kind() -> &'static str {
    "milestone"
  }
}

impl Entity for Repository {
  fn id(&self) -> u64 {
    self.id
  }

  fn kind() -> &'static str {
    "repository"
  }
}

/// Table of canonical instances, one per id.
///
/// The first instance seen for an id becomes canonical; later instances with
/// the same id are replaced by a handle to it.
#[derive(Debug)]
pub struct InternTable<T> {
  entries: HashMap<u64, Arc<T>>,
}

impl<T> Default for InternTable<T> {
  fn default() -> Self {
    Self {
      entries: HashMap::new(),
    }
  }
}

impl<T: Entity> InternTable<T> {
  /// Point `handle` at the canonical instance for its id, registering it if
  /// the id has not been seen yet. Unset ids are left alone.
  pub fn intern(&mut self, handle: &mut Arc<T>) {
    let id = handle.id();
    if id == 0 {
      return;
    }
    match self.entries.entry(id) {
      Entry::Occupied(canonical) => {
        if !Arc::ptr_eq(canonical.get(), handle) {
          *handle = Arc::clone(canonical.get());
        }
      }
      Entry::Vacant(slot) => {
        trace!(kind = T::kind(), id, "new entity");
        slot.insert(Arc::clone(handle));
      }
    }
  }

  pub fn intern_opt(&mut self, handle: &mut Option<Arc<T>>) {
    if let Some(handle) = handle {
      self.intern(handle);
    }
  }

  #[cfg(test)]
  pub fn get(&self, id: u64) -> Option<&Arc<T>> {
    self.entries.get(&id)
  }

  pub fn len(&self) -> usize {
    self.entries.len()
  }
}
