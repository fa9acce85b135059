//! softdel-store: The persistence boundary for the soft delete services.
//!
//! Every read and write the soft delete services perform flows through the
//! `Store` trait: scoped and scope-bypassing queries, navigation loading,
//! add/remove of tracked records, and commit. `MemoryStore` is the in-memory
//! unit-of-work implementation used by the CLI and the tests.

pub mod error;
pub mod memory;
pub mod query;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::{Dataset, EntryState, MemoryStore};
pub use query::{Query, QueryTarget};
pub use store::Store;
