//! The persistence boundary trait.

use async_trait::async_trait;
use softdel_core::{EntityModel, Record, RecordFilter, RecordId};

use crate::error::Result;
use crate::query::Query;

/// A unit-of-work over persisted records.
///
/// Records returned by `fetch` are tracked: later fetches of the same row
/// return the same `RecordId`, and in-memory changes to a tracked record are
/// written on `save_changes`. Query predicates run against the persisted
/// values, not against pending in-memory changes.
///
/// Only `fetch` and `save_changes` may suspend. A store that can always answer
/// without suspending lets callers drive these futures to completion in one
/// poll.
#[async_trait]
pub trait Store: Send + Sync {
    fn model(&self) -> &EntityModel;

    /// A tracked record.
    fn record(&self, id: RecordId) -> Option<&Record>;

    fn record_mut(&mut self, id: RecordId) -> Option<&mut Record>;

    /// The records already materialised for a navigation, or `None` when it
    /// has never been loaded.
    fn loaded_navigation(&self, id: RecordId, navigation: &str) -> Option<Vec<RecordId>>;

    /// Install a default scope for an entity type, and-ed with any existing one.
    fn add_query_filter(&mut self, entity_type: &str, filter: RecordFilter) -> Result<()>;

    /// Start tracking a new record, inserted on the next commit.
    fn add(&mut self, record: Record) -> Result<RecordId>;

    /// Mark a tracked record for physical removal on the next commit.
    fn remove(&mut self, id: RecordId) -> Result<()>;

    /// Cancel a pending `remove`, tracking the record as before. A record
    /// that was added and then removed is no longer tracked and cannot be
    /// restored.
    fn restore(&mut self, id: RecordId) -> Result<()>;

    async fn fetch(&mut self, query: &Query) -> Result<Vec<RecordId>>;

    /// Commit all tracked changes atomically. Returns the number of tracked
    /// records written.
    async fn save_changes(&mut self) -> Result<usize>;
}
