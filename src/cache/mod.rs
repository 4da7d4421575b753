//! Local mirror of a project's issues.
//!
//! This module provides:
//! - An in-memory store of issues keyed by number
//! - Interning of users, milestones and repositories so each id has one instance
//! - Durable storage as one JSON file per issue plus a metadata file

mod intern;
mod storage;
mod store;

pub use storage::{CacheStorage, DirStorage};
pub use store::{EntityStore, Issue, Project};
