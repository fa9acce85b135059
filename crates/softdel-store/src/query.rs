//! Query construction.

use softdel_core::{KeyValue, RecordFilter, RecordId};

/// Where a query draws its rows from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryTarget {
    /// Every row of an entity type.
    EntityType(String),
    /// Rows related to a tracked record through one of its navigations.
    Navigation { record: RecordId, navigation: String },
}

/// A query over one entity type, optionally bypassing the default scope.
#[derive(Debug, Clone)]
pub struct Query {
    pub target: QueryTarget,
    pub ignore_query_filters: bool,
    pub filter: Option<RecordFilter>,
    pub key: Option<Vec<KeyValue>>,
}

impl Query {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self::from_target(QueryTarget::EntityType(entity_type.into()))
    }

    /// The records reachable from `record` through `navigation`.
    pub fn navigation(record: RecordId, navigation: impl Into<String>) -> Self {
        Self::from_target(QueryTarget::Navigation {
            record,
            navigation: navigation.into(),
        })
    }

    fn from_target(target: QueryTarget) -> Self {
        Self {
            target,
            ignore_query_filters: false,
            filter: None,
            key: None,
        }
    }

    /// Skip the default scope registered for the entity type.
    pub fn ignore_query_filters(mut self) -> Self {
        self.ignore_query_filters = true;
        self
    }

    /// Add a predicate; repeated calls are and-ed.
    pub fn filter(mut self, filter: RecordFilter) -> Self {
        self.filter = RecordFilter::all(self.filter.take(), Some(filter));
        self
    }

    /// Add a predicate if present.
    pub fn filter_opt(self, filter: Option<RecordFilter>) -> Self {
        match filter {
            Some(f) => self.filter(f),
            None => self,
        }
    }

    /// Restrict to the row with this primary key.
    pub fn key(mut self, key: Vec<KeyValue>) -> Self {
        self.key = Some(key);
        self
    }
}
