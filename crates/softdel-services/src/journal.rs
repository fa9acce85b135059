//! Undo log for changes made to tracked records before a commit.

use softdel_core::{Record, RecordId};
use softdel_store::Store;

#[derive(Debug)]
enum Undo {
    Replace(RecordId, Record),
    Restore(RecordId),
}

/// Changes applied to tracked records, newest last.
#[derive(Debug, Default)]
pub struct Journal {
    undo: Vec<Undo>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `before`, the state of `id` ahead of an in-place change.
    pub fn changed(&mut self, id: RecordId, before: Record) {
        self.undo.push(Undo::Replace(id, before));
    }

    pub fn removed(&mut self, id: RecordId) {
        self.undo.push(Undo::Restore(id));
    }

    pub fn len(&self) -> usize {
        self.undo.len()
    }

    pub fn is_empty(&self) -> bool {
        self.undo.is_empty()
    }

    /// Put every journaled record back as it was, newest change first.
    pub fn undo<S: Store + ?Sized>(self, store: &mut S) {
        let changes = self.undo.len();
        for step in self.undo.into_iter().rev() {
            match step {
                Undo::Replace(id, before) => {
                    if let Some(record) = store.record_mut(id) {
                        *record = before;
                    }
                }
                Undo::Restore(id) => {
                    if let Err(err) = store.restore(id) {
                        tracing::warn!(record = %id, %err, "Could not restore removed record");
                    }
                }
            }
        }
        tracing::debug!(changes, "Rolled back tracked changes");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use softdel_core::{EntityModel, EntityTypeDef, KeyKind, KeyValue};
    use softdel_store::{Dataset, MemoryStore, Query};

    fn store() -> MemoryStore {
        let dataset = Dataset {
            model: EntityModel::new()
                .with_entity(EntityTypeDef::new("Book").key("Id", KeyKind::Int)),
            records: serde_json::from_value(json!({
                "Book": [{"Id": 1, "Title": "Dune"}, {"Id": 2, "Title": "Emma"}]
            }))
            .unwrap(),
        };
        MemoryStore::from_dataset(dataset).unwrap()
    }

    #[tokio::test]
    async fn test_undo_leaves_nothing_to_commit() {
        let mut store = store();
        let ids = store.fetch_now(&Query::new("Book")).unwrap();
        let mut journal = Journal::new();

        let before = store.record(ids[0]).unwrap().clone();
        journal.changed(ids[0], before);
        store.record_mut(ids[0]).unwrap().set_property("Title", "Dune Messiah");
        store.remove(ids[1]).unwrap();
        journal.removed(ids[1]);
        assert_eq!(journal.len(), 2);

        journal.undo(&mut store);
        assert_eq!(store.save_changes().await.unwrap(), 0);
        assert_eq!(store.row_count("Book"), 2);
        let book = store.row("Book", &[KeyValue::Int(1)]).unwrap();
        assert_eq!(book.str_property("Title"), Some("Dune"));
    }
}
