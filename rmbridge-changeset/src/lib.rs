//! # rmbridge-changeset
//!
//! Change-set compiler: diffs a requirements-tool snapshot against the
//! target model and emits the declarative actions that bring the model in
//! line.
//!
//! Call [`calculate_change_set`] for one tracker, or [`pipeline::run`] for
//! every module of a snapshot. [`writer`] persists the results.

mod attribute;
pub mod compiler;
mod context;
pub mod error;
pub mod find;
pub mod pipeline;
mod schema;
mod tree;
pub mod writer;

pub use compiler::{calculate_change_set, try_calculate, ChangeSet, ChangeSetOptions, Policy};
pub use error::{ChangeSetError, SyncError};
pub use find::{FindError, Finder, MatchKey};
pub use pipeline::ModuleChange;
pub use writer::{write_change_set, write_error_log, WriteResult};
