//! Query filter builder.
//!
//! Composes the delete-state test of a capability with the extra scoping
//! predicates configured for marker types (typically an owner/tenant check)
//! into one `RecordFilter`. The same composition serves as a store's default
//! scope (delete value == active) and as the level filter the cascade walker
//! applies when it loads children.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use uuid::Uuid;

use crate::capability::{DeleteCapability, Marker, USER_ID_MARKER};
use crate::error::ConfigError;
use crate::model::EntityTypeDef;
use crate::record::Record;

/// Reads a capability's delete value from a record.
pub type ValueGetter<V> = Arc<dyn Fn(&Record) -> V + Send + Sync>;

/// Writes a capability's delete value into a record.
pub type ValueSetter<V> = Arc<dyn Fn(&mut Record, V) + Send + Sync>;

/// Extra scoping predicates keyed by the marker an entity type must declare
/// for the predicate to apply.
pub type ScopeFilters = BTreeMap<Marker, ScopeFilter>;

/// A boolean predicate over records.
#[derive(Clone)]
pub struct RecordFilter(Arc<dyn Fn(&Record) -> bool + Send + Sync>);

impl RecordFilter {
    pub fn new(predicate: impl Fn(&Record) -> bool + Send + Sync + 'static) -> Self {
        Self(Arc::new(predicate))
    }

    pub fn matches(&self, record: &Record) -> bool {
        (self.0)(record)
    }

    /// Both predicates must hold; `self` is evaluated first.
    pub fn and(self, other: RecordFilter) -> RecordFilter {
        RecordFilter::new(move |r| self.matches(r) && other.matches(r))
    }

    /// Conjunction of two optional filters; absent sides are ignored.
    pub fn all(first: Option<RecordFilter>, second: Option<RecordFilter>) -> Option<RecordFilter> {
        match (first, second) {
            (Some(a), Some(b)) => Some(a.and(b)),
            (a, None) => a,
            (None, b) => b,
        }
    }
}

impl fmt::Debug for RecordFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("RecordFilter(..)")
    }
}

/// An extra scoping predicate with the name of its bound record variable.
///
/// All scope filters that apply to one entity type must use the same binding.
#[derive(Clone, Debug)]
pub struct ScopeFilter {
    binding: String,
    filter: RecordFilter,
}

impl ScopeFilter {
    pub fn new(
        binding: impl Into<String>,
        predicate: impl Fn(&Record) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            binding: binding.into(),
            filter: RecordFilter::new(predicate),
        }
    }

    /// Only records whose `UserId` property equals `user_id`.
    pub fn user_id(binding: impl Into<String>, user_id: Uuid) -> Self {
        Self::new(binding, move |r| r.uuid_property(USER_ID_MARKER) == Some(user_id))
    }

    pub fn binding(&self) -> &str {
        &self.binding
    }

    pub fn filter(&self) -> &RecordFilter {
        &self.filter
    }
}

/// Check that every configured scope filter uses the same binding.
pub fn check_bindings(other_filters: &ScopeFilters) -> Result<(), ConfigError> {
    ensure_same_binding(other_filters.iter()).map(|_| ())
}

fn ensure_same_binding<'a>(
    mut filters: impl Iterator<Item = (&'a Marker, &'a ScopeFilter)>,
) -> Result<Vec<&'a ScopeFilter>, ConfigError> {
    let Some((_, first)) = filters.next() else {
        return Ok(Vec::new());
    };
    let mut applicable = vec![first];
    for (marker, filter) in filters {
        if filter.binding != first.binding {
            return Err(ConfigError::FilterBindingMismatch {
                marker: marker.clone(),
                expected: first.binding.clone(),
                found: filter.binding.clone(),
            });
        }
        applicable.push(filter);
    }
    Ok(applicable)
}

/// The extra scoping predicates that apply to an entity type, and-ed together.
/// `None` when no configured marker is declared by the entity type.
pub fn scope_filters_only(
    other_filters: &ScopeFilters,
    entity: &EntityTypeDef,
) -> Result<Option<RecordFilter>, ConfigError> {
    let applicable = ensure_same_binding(
        other_filters
            .iter()
            .filter(|(marker, _)| entity.has_marker(marker)),
    )?;

    Ok(applicable
        .into_iter()
        .map(|f| f.filter.clone())
        .reduce(RecordFilter::and))
}

/// "delete value == `value`" and-ed with the applicable scope filters.
///
/// The delete-state test only applies when the entity type declares the
/// capability; if neither it nor any scope filter applies the result is `None`.
pub fn delete_state_filter<C: DeleteCapability>(
    getter: &ValueGetter<C::Value>,
    value: C::Value,
    other_filters: &ScopeFilters,
    entity: &EntityTypeDef,
) -> Result<Option<RecordFilter>, ConfigError> {
    let state = entity.implements::<C>().then(|| {
        let getter = Arc::clone(getter);
        RecordFilter::new(move |r| getter(r) == value)
    });
    let extras = scope_filters_only(other_filters, entity)?;
    Ok(RecordFilter::all(state, extras))
}
