//! softdel-services: Single and cascade soft delete over a `Store`.
//!
//! Each service comes in a blocking form and an async form that share one
//! implementation. Operations validate their input, walk or update the
//! affected records, optionally commit, and report a `SoftDeleteStatus`.

pub mod cascade;
pub mod error;
pub mod execution;
pub mod guard;
pub mod journal;
pub mod loader;
pub mod scope;
pub mod single;
pub mod walker;

pub use cascade::{CascadeSoftDeleteService, CascadeSoftDeleteServiceAsync};
pub use error::{Result, SoftDeleteError};
pub use execution::Execution;
pub use journal::Journal;
pub use scope::register_query_filters;
pub use single::{SingleSoftDeleteService, SingleSoftDeleteServiceAsync};
pub use walker::{CascadeWalker, WalkMode};
