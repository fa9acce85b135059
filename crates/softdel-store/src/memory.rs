//! In-memory unit-of-work store.
//!
//! Committed rows live per entity type, keyed by primary key. Rows a query
//! returns become tracked entries (one `RecordId` per row, via the identity
//! map); callers mutate tracked records in place and `save_changes` writes
//! them back together with pending inserts and removals. Removal applies the
//! model's delete behaviors the way a relational database would: `Cascade`
//! and `SetNull` act on any row, the client variants only on tracked rows,
//! and a remaining dependent is a foreign-key violation.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use softdel_core::{
    DeleteBehavior, EntityModel, EntityTypeDef, KeyValue, Record, RecordFilter, RecordId,
};

use crate::error::{format_key, Result, StoreError};
use crate::query::{Query, QueryTarget};
use crate::store::Store;

type RowKey = Vec<KeyValue>;
type RowRef = (String, RowKey);
type Rows = BTreeMap<String, BTreeMap<RowKey, Record>>;

/// A model plus its committed rows, as read from and written to JSON.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    pub model: EntityModel,
    /// Rows per entity type, each a JSON object of properties.
    #[serde(default)]
    pub records: BTreeMap<String, Vec<Map<String, Value>>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryState {
    Added,
    Unchanged,
    Deleted,
}

#[derive(Debug, Clone)]
struct Entry {
    record: Record,
    key: RowKey,
    state: EntryState,
}

/// Rows removed and foreign keys nulled by one commit.
struct DeletePlan {
    doomed: BTreeSet<RowRef>,
    nulls: Vec<(usize, RowRef)>,
}

#[derive(Debug)]
pub struct MemoryStore {
    model: EntityModel,
    rows: Rows,
    entries: HashMap<RecordId, Entry>,
    identity: HashMap<RowRef, RecordId>,
    loaded: HashMap<(RecordId, String), Vec<RecordId>>,
    query_filters: HashMap<String, RecordFilter>,
    next_id: u64,
}

impl MemoryStore {
    /// An empty store over a validated model.
    pub fn new(model: EntityModel) -> Result<Self> {
        model.validate()?;
        let rows = model
            .entity_types()
            .iter()
            .map(|def| (def.name.clone(), BTreeMap::new()))
            .collect();
        Ok(Self {
            model,
            rows,
            entries: HashMap::new(),
            identity: HashMap::new(),
            loaded: HashMap::new(),
            query_filters: HashMap::new(),
            next_id: 1,
        })
    }

    /// A store whose committed rows are the dataset's records.
    pub fn from_dataset(dataset: Dataset) -> Result<Self> {
        let mut store = Self::new(dataset.model)?;
        for (entity_type, rows) in dataset.records {
            let def = store.def(&entity_type)?.clone();
            for properties in rows {
                let record = Record {
                    entity_type: entity_type.clone(),
                    properties,
                };
                let key = key_for(&def, &record)?;
                let table = store.rows.entry(entity_type.clone()).or_default();
                if table.contains_key(&key) {
                    return Err(StoreError::DuplicateKey {
                        entity_type,
                        key: format_key(&key),
                    });
                }
                table.insert(key, record);
            }
        }
        tracing::debug!(
            entity_types = store.rows.len(),
            rows = store.rows.values().map(BTreeMap::len).sum::<usize>(),
            "Loaded dataset"
        );
        Ok(store)
    }

    /// The committed state as a dataset.
    pub fn dataset(&self) -> Dataset {
        let records = self
            .rows
            .iter()
            .map(|(entity_type, table)| {
                let rows = table.values().map(|r| r.properties.clone()).collect();
                (entity_type.clone(), rows)
            })
            .collect();
        Dataset {
            model: self.model.clone(),
            records,
        }
    }

    // ── Committed rows ───────────────────────────────────────────

    pub fn rows(&self, entity_type: &str) -> Vec<&Record> {
        self.rows
            .get(entity_type)
            .map(|table| table.values().collect())
            .unwrap_or_default()
    }

    pub fn row(&self, entity_type: &str, key: &[KeyValue]) -> Option<&Record> {
        self.rows.get(entity_type).and_then(|table| table.get(key))
    }

    pub fn row_count(&self, entity_type: &str) -> usize {
        self.rows.get(entity_type).map_or(0, BTreeMap::len)
    }

    // ── Tracked entries ──────────────────────────────────────────

    pub fn state(&self, id: RecordId) -> Option<EntryState> {
        self.entries.get(&id).map(|e| e.state)
    }

    pub fn tracked_count(&self) -> usize {
        self.entries.len()
    }

    /// Track the row of `entity_type` with this key under the default scope.
    pub fn find(&mut self, entity_type: &str, key: Vec<KeyValue>) -> Result<Option<RecordId>> {
        let ids = self.fetch_now(&Query::new(entity_type).key(key))?;
        Ok(ids.into_iter().next())
    }

    /// Materialise a navigation under the default scope.
    pub fn include(&mut self, id: RecordId, navigation: &str) -> Result<Vec<RecordId>> {
        let ids = self.fetch_now(&Query::navigation(id, navigation))?;
        self.loaded
            .insert((id, navigation.to_string()), ids.clone());
        Ok(ids)
    }

    fn def(&self, entity_type: &str) -> Result<&EntityTypeDef> {
        self.model
            .entity_type(entity_type)
            .ok_or_else(|| StoreError::UnknownEntityType(entity_type.to_string()))
    }

    fn entry(&self, id: RecordId) -> Result<&Entry> {
        self.entries.get(&id).ok_or(StoreError::UnknownRecord(id))
    }

    // ── Queries ──────────────────────────────────────────────────

    /// Run a query without suspending.
    pub fn fetch_now(&mut self, query: &Query) -> Result<Vec<RecordId>> {
        let (entity_type, candidates, source) = match &query.target {
            QueryTarget::EntityType(entity_type) => {
                self.def(entity_type)?;
                let keys = self
                    .rows
                    .get(entity_type)
                    .map(|table| table.keys().cloned().collect())
                    .unwrap_or_default();
                (entity_type.clone(), keys, None)
            }
            QueryTarget::Navigation { record, navigation } => {
                let (target, keys, on_dependent) = self.related_keys(*record, navigation)?;
                (target, keys, Some((*record, navigation.clone(), on_dependent)))
            }
        };

        let scope = if query.ignore_query_filters {
            None
        } else {
            self.query_filters.get(&entity_type)
        };

        let matched: Vec<RowKey> = candidates
            .into_iter()
            .filter(|key| query.key.as_ref().map_or(true, |wanted| wanted == key))
            .filter(|key| {
                self.row(&entity_type, key).is_some_and(|row| {
                    scope.map_or(true, |f| f.matches(row))
                        && query.filter.as_ref().map_or(true, |f| f.matches(row))
                })
            })
            .collect();

        let ids: Vec<RecordId> = matched
            .into_iter()
            .filter_map(|key| self.attach(&entity_type, key))
            .collect();

        if let Some((record, navigation, on_dependent)) = source {
            let loaded = self.loaded.entry((record, navigation)).or_default();
            if on_dependent {
                *loaded = ids.clone();
            } else {
                for id in &ids {
                    if !loaded.contains(id) {
                        loaded.push(*id);
                    }
                }
            }
        }

        tracing::debug!(
            entity_type = %entity_type,
            ignore_query_filters = query.ignore_query_filters,
            rows = ids.len(),
            "Fetched"
        );
        Ok(ids)
    }

    /// Committed keys of the rows related to `record` through `navigation`.
    fn related_keys(
        &self,
        record: RecordId,
        navigation: &str,
    ) -> Result<(String, Vec<RowKey>, bool)> {
        let entry = self.entry(record)?;
        let nav = self
            .model
            .navigation(&entry.record.entity_type, navigation)
            .ok_or_else(|| StoreError::UnknownNavigation {
                entity_type: entry.record.entity_type.clone(),
                navigation: navigation.to_string(),
            })?;
        let rel = self
            .model
            .relationship(nav.relationship)
            .ok_or_else(|| StoreError::UnknownNavigation {
                entity_type: entry.record.entity_type.clone(),
                navigation: navigation.to_string(),
            })?;
        let principal = self.def(&rel.principal)?;

        let keys = if nav.on_dependent {
            rel.foreign_key_of(&entry.record, principal)
                .filter(|fk| self.row(&rel.principal, fk).is_some())
                .into_iter()
                .collect()
        } else {
            match principal.key_of(&entry.record) {
                Some(pk) => self
                    .rows
                    .get(&rel.dependent)
                    .map(|table| {
                        table
                            .iter()
                            .filter(|(_, row)| {
                                rel.foreign_key_of(row, principal).as_ref() == Some(&pk)
                            })
                            .map(|(key, _)| key.clone())
                            .collect()
                    })
                    .unwrap_or_default(),
                None => Vec::new(),
            }
        };
        Ok((nav.target, keys, nav.on_dependent))
    }

    /// Track a committed row, reusing its entry if already tracked.
    /// Rows pending removal are not returned.
    fn attach(&mut self, entity_type: &str, key: RowKey) -> Option<RecordId> {
        let row_ref = (entity_type.to_string(), key);
        if let Some(id) = self.identity.get(&row_ref) {
            return match self.entries.get(id) {
                Some(entry) if entry.state == EntryState::Deleted => None,
                Some(_) => Some(*id),
                None => None,
            };
        }

        let record = self.row(entity_type, &row_ref.1)?.clone();
        let id = RecordId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            Entry {
                record,
                key: row_ref.1.clone(),
                state: EntryState::Unchanged,
            },
        );
        self.identity.insert(row_ref, id);
        Some(id)
    }

    // ── Commit ───────────────────────────────────────────────────

    fn commit(&mut self) -> Result<usize> {
        let mut next = self.rows.clone();
        let mut written = HashSet::new();

        for (id, entry) in &self.entries {
            let table = next.entry(entry.record.entity_type.clone()).or_default();
            let changed = match entry.state {
                EntryState::Added => true,
                EntryState::Unchanged => table.get(&entry.key) != Some(&entry.record),
                EntryState::Deleted => false,
            };
            if changed {
                table.insert(entry.key.clone(), entry.record.clone());
                written.insert(*id);
            }
        }

        let roots = self
            .entries
            .values()
            .filter(|e| e.state == EntryState::Deleted)
            .map(|e| (e.record.entity_type.clone(), e.key.clone()))
            .collect();
        let plan = self.plan_deletes(&next, roots)?;

        for row_ref in &plan.doomed {
            if let Some(table) = next.get_mut(&row_ref.0) {
                table.remove(&row_ref.1);
            }
            if let Some(id) = self.identity.get(row_ref) {
                written.insert(*id);
            }
        }
        for (rel_index, row_ref) in &plan.nulls {
            let Some(rel) = self.model.relationship(*rel_index) else {
                continue;
            };
            if let Some(row) = next.get_mut(&row_ref.0).and_then(|t| t.get_mut(&row_ref.1)) {
                for fk in &rel.foreign_key {
                    row.set_property(fk, Value::Null);
                }
            }
            if let Some(id) = self.identity.get(row_ref).copied() {
                if let Some(entry) = self.entries.get_mut(&id) {
                    for fk in &rel.foreign_key {
                        entry.record.set_property(fk, Value::Null);
                    }
                }
                written.insert(id);
            }
        }

        self.rows = next;
        for row_ref in &plan.doomed {
            if let Some(id) = self.identity.remove(row_ref) {
                self.detach(id);
            }
        }
        for entry in self.entries.values_mut() {
            entry.state = EntryState::Unchanged;
        }

        tracing::debug!(
            written = written.len(),
            removed = plan.doomed.len(),
            "Committed changes"
        );
        Ok(written.len())
    }

    /// Close the set of removed rows over the model's delete behaviors.
    fn plan_deletes(&self, rows: &Rows, roots: Vec<RowRef>) -> Result<DeletePlan> {
        let mut doomed: BTreeSet<RowRef> = roots.into_iter().collect();
        let mut queue: Vec<RowRef> = doomed.iter().cloned().collect();
        let mut nulls = Vec::new();
        let mut blocked = Vec::new();

        while let Some((entity_type, key)) = queue.pop() {
            let Some(principal) = self.model.entity_type(&entity_type) else {
                continue;
            };
            for (rel_index, rel) in self.model.relationships().iter().enumerate() {
                if rel.principal != entity_type {
                    continue;
                }
                let Some(table) = rows.get(&rel.dependent) else {
                    continue;
                };
                for (dep_key, row) in table {
                    if rel.foreign_key_of(row, principal).as_ref() != Some(&key) {
                        continue;
                    }
                    let dep = (rel.dependent.clone(), dep_key.clone());
                    if doomed.contains(&dep) {
                        continue;
                    }
                    let tracked = self.identity.contains_key(&dep);
                    match rel.delete_behavior {
                        DeleteBehavior::Cascade => {
                            doomed.insert(dep.clone());
                            queue.push(dep);
                        }
                        DeleteBehavior::ClientCascade if tracked => {
                            doomed.insert(dep.clone());
                            queue.push(dep);
                        }
                        DeleteBehavior::SetNull => nulls.push((rel_index, dep)),
                        DeleteBehavior::ClientSetNull if tracked => nulls.push((rel_index, dep)),
                        behavior => blocked.push((rel_index, behavior, key.clone(), dep)),
                    }
                }
            }
        }

        if let Some((rel_index, behavior, key, dep)) =
            blocked.into_iter().find(|(.., dep)| !doomed.contains(dep))
        {
            let rel = self.model.relationship(rel_index);
            return Err(StoreError::ForeignKeyViolation {
                principal: rel.map(|r| r.principal.clone()).unwrap_or_default(),
                key: format_key(&key),
                dependent: dep.0,
                foreign_key: rel.map(|r| r.foreign_key.join(", ")).unwrap_or_default(),
                behavior: format!("{behavior:?}"),
            });
        }
        nulls.retain(|(_, dep)| !doomed.contains(dep));
        Ok(DeletePlan { doomed, nulls })
    }

    fn detach(&mut self, id: RecordId) {
        self.entries.remove(&id);
        self.loaded.retain(|(owner, _), _| *owner != id);
        for ids in self.loaded.values_mut() {
            ids.retain(|i| *i != id);
        }
    }
}

fn key_for(def: &EntityTypeDef, record: &Record) -> Result<RowKey> {
    def.primary_key
        .iter()
        .map(|p| {
            record
                .property(&p.name)
                .and_then(|v| KeyValue::from_json(p.kind, v))
                .ok_or_else(|| StoreError::MissingKey {
                    entity_type: def.name.clone(),
                    property: p.name.clone(),
                })
        })
        .collect()
}

#[async_trait]
impl Store for MemoryStore {
    fn model(&self) -> &EntityModel {
        &self.model
    }

    fn record(&self, id: RecordId) -> Option<&Record> {
        self.entries.get(&id).map(|e| &e.record)
    }

    fn record_mut(&mut self, id: RecordId) -> Option<&mut Record> {
        self.entries.get_mut(&id).map(|e| &mut e.record)
    }

    fn loaded_navigation(&self, id: RecordId, navigation: &str) -> Option<Vec<RecordId>> {
        self.loaded
            .get(&(id, navigation.to_string()))
            .map(|ids| {
                ids.iter()
                    .copied()
                    .filter(|i| self.entries.contains_key(i))
                    .collect()
            })
    }

    fn add_query_filter(&mut self, entity_type: &str, filter: RecordFilter) -> Result<()> {
        self.def(entity_type)?;
        let existing = self.query_filters.remove(entity_type);
        if let Some(combined) = RecordFilter::all(existing, Some(filter)) {
            self.query_filters.insert(entity_type.to_string(), combined);
        }
        Ok(())
    }

    fn add(&mut self, record: Record) -> Result<RecordId> {
        let def = self.def(&record.entity_type)?;
        let key = key_for(def, &record)?;
        let row_ref = (record.entity_type.clone(), key);
        if self.identity.contains_key(&row_ref) || self.row(&row_ref.0, &row_ref.1).is_some() {
            return Err(StoreError::DuplicateKey {
                entity_type: row_ref.0,
                key: format_key(&row_ref.1),
            });
        }

        let id = RecordId(self.next_id);
        self.next_id += 1;
        self.entries.insert(
            id,
            Entry {
                record,
                key: row_ref.1.clone(),
                state: EntryState::Added,
            },
        );
        self.identity.insert(row_ref, id);
        Ok(id)
    }

    fn remove(&mut self, id: RecordId) -> Result<()> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(StoreError::UnknownRecord(id))?;
        if entry.state == EntryState::Added {
            let row_ref = (entry.record.entity_type.clone(), entry.key.clone());
            self.identity.remove(&row_ref);
            self.detach(id);
        } else {
            entry.state = EntryState::Deleted;
        }
        Ok(())
    }

    fn restore(&mut self, id: RecordId) -> Result<()> {
        let entry = self
            .entries
            .get_mut(&id)
            .ok_or(StoreError::UnknownRecord(id))?;
        if entry.state == EntryState::Deleted {
            entry.state = EntryState::Unchanged;
        }
        Ok(())
    }

    async fn fetch(&mut self, query: &Query) -> Result<Vec<RecordId>> {
        self.fetch_now(query)
    }

    async fn save_changes(&mut self) -> Result<usize> {
        self.commit()
    }
}
