//! Incremental synchronization of a project with GitHub.

mod engine;
mod policy;

pub use engine::{SyncOptions, Syncer};
