//! Entity and navigation loading.
//!
//! All loads bypass the store's default scope (so soft deleted rows are
//! reachable) but always keep the configured extra scope filters, so a
//! caller's tenant boundary is never crossed.

use softdel_core::{
    DeleteCapability, KeyValue, Navigation, RecordId, SoftDeleteConfig, ValidationError,
};
use softdel_store::{Query, Store, StoreError};

use crate::error::Result;
use crate::execution::Execution;

/// Resolve a record by primary key. `Ok(None)` when no visible row matches.
pub async fn load_by_keys<S, C>(
    store: &mut S,
    config: &SoftDeleteConfig<C>,
    execution: Execution,
    entity_type: &str,
    keys: &[KeyValue],
) -> Result<Option<RecordId>>
where
    S: Store + ?Sized,
    C: DeleteCapability,
{
    let def = store
        .model()
        .entity_type(entity_type)
        .ok_or_else(|| ValidationError::UnknownEntityType(entity_type.to_string()))?;
    if def.owned {
        return Err(ValidationError::OwnedEntityType(entity_type.to_string()).into());
    }
    if def.primary_key.is_empty() {
        return Err(ValidationError::NoPrimaryKey(entity_type.to_string()).into());
    }
    if def.primary_key.len() != keys.len() {
        return Err(ValidationError::KeyCountMismatch {
            provided: keys.len(),
            expected: def.primary_key.len(),
        }
        .into());
    }
    for (i, (property, key)) in def.primary_key.iter().zip(keys).enumerate() {
        if property.kind != key.kind() {
            return Err(ValidationError::KeyTypeMismatch {
                position: i + 1,
                count: keys.len(),
                provided: key.kind(),
                expected: property.kind,
            }
            .into());
        }
    }

    let query = Query::new(entity_type)
        .ignore_query_filters()
        .filter_opt(config.scope_only(def)?)
        .key(keys.to_vec());
    let ids = execution.run("load by keys", store.fetch(&query)).await??;
    Ok(ids.into_iter().next())
}

/// Load a collection navigation: related rows whose delete value is `value`.
pub async fn load_collection<S, C>(
    store: &mut S,
    config: &SoftDeleteConfig<C>,
    execution: Execution,
    principal: RecordId,
    navigation: &Navigation,
    value: C::Value,
) -> Result<Vec<RecordId>>
where
    S: Store + ?Sized,
    C: DeleteCapability,
{
    let query = navigation_query(store, config, principal, navigation, value)?;
    Ok(execution.run("load collection", store.fetch(&query)).await??)
}

/// Load a single-valued navigation. More than one matching row is an error.
pub async fn load_singleton<S, C>(
    store: &mut S,
    config: &SoftDeleteConfig<C>,
    execution: Execution,
    principal: RecordId,
    navigation: &Navigation,
    value: C::Value,
) -> Result<Option<RecordId>>
where
    S: Store + ?Sized,
    C: DeleteCapability,
{
    let query = navigation_query(store, config, principal, navigation, value)?;
    let ids = execution.run("load singleton", store.fetch(&query)).await??;
    if ids.len() > 1 {
        let entity_type = store
            .record(principal)
            .map(|r| r.entity_type.clone())
            .unwrap_or_default();
        return Err(StoreError::MultipleRows {
            entity_type,
            navigation: navigation.name.clone(),
            count: ids.len(),
        }
        .into());
    }
    Ok(ids.into_iter().next())
}

fn navigation_query<S, C>(
    store: &S,
    config: &SoftDeleteConfig<C>,
    principal: RecordId,
    navigation: &Navigation,
    value: C::Value,
) -> Result<Query>
where
    S: Store + ?Sized,
    C: DeleteCapability,
{
    let target = store
        .model()
        .entity_type(&navigation.target)
        .ok_or_else(|| StoreError::UnknownEntityType(navigation.target.clone()))?;
    Ok(Query::navigation(principal, navigation.name.clone())
        .ignore_query_filters()
        .filter_opt(config.value_filter(target, value)?))
}
