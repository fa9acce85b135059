//! Default scope registration.

use softdel_core::{DeleteCapability, SoftDeleteConfig};
use softdel_store::Store;

use crate::error::Result;

/// Install the default scope (delete value is active, plus the applicable
/// extra scope filters) for every entity type declaring the capability.
/// Returns the number of entity types scoped.
pub fn register_query_filters<S, C>(store: &mut S, config: &SoftDeleteConfig<C>) -> Result<usize>
where
    S: Store + ?Sized,
    C: DeleteCapability,
{
    let scoped: Vec<_> = store
        .model()
        .entity_types()
        .iter()
        .filter(|def| def.implements::<C>())
        .cloned()
        .collect();

    for def in &scoped {
        if let Some(filter) = config.default_scope(def)? {
            store.add_query_filter(&def.name, filter)?;
        }
    }

    tracing::info!(
        capability = C::MARKER,
        entity_types = scoped.len(),
        "Registered default scopes"
    );
    Ok(scoped.len())
}
