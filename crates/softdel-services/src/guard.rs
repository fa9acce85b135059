//! Precondition checks shared by the services.

use softdel_core::{DeleteCapability, EntityModel, Multiplicity, ValidationError};

/// Reject records on the dependent side of a one-to-one relationship.
/// A soft deleted row there still holds the unique foreign key, so a
/// replacement could never be created.
pub fn ensure_not_one_to_one(
    model: &EntityModel,
    entity_type: &str,
) -> Result<(), ValidationError> {
    if model
        .foreign_keys(entity_type)
        .any(|rel| rel.multiplicity == Multiplicity::OneToOne)
    {
        return Err(ValidationError::OneToOne {
            entity_type: entity_type.to_string(),
        });
    }
    Ok(())
}

/// The entity type must be known and declare the capability.
pub fn ensure_capability<C: DeleteCapability>(
    model: &EntityModel,
    entity_type: &str,
) -> Result<(), ValidationError> {
    let def = model
        .entity_type(entity_type)
        .ok_or_else(|| ValidationError::UnknownEntityType(entity_type.to_string()))?;
    if !def.implements::<C>() {
        return Err(ValidationError::MissingCapability {
            entity_type: entity_type.to_string(),
            marker: C::MARKER.to_string(),
        });
    }
    Ok(())
}
