use softdel_core::{KeyValue, ModelError, RecordId};

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Invalid model: {0}")]
    Model(#[from] ModelError),

    #[error("Entity type {0} is not in the model")]
    UnknownEntityType(String),

    #[error("Entity type {entity_type} has no navigation named {navigation}")]
    UnknownNavigation {
        entity_type: String,
        navigation: String,
    },

    #[error("Record {0} is not tracked by this store")]
    UnknownRecord(RecordId),

    #[error("Record of {entity_type} is missing primary key property {property}")]
    MissingKey {
        entity_type: String,
        property: String,
    },

    #[error("A {entity_type} with key ({key}) already exists")]
    DuplicateKey { entity_type: String, key: String },

    #[error("Deleting {principal} ({key}) violates the {behavior} foreign key {foreign_key} of {dependent}")]
    ForeignKeyViolation {
        principal: String,
        key: String,
        dependent: String,
        foreign_key: String,
        behavior: String,
    },

    #[error("Navigation {navigation} of {entity_type} returned {count} rows where at most one was expected")]
    MultipleRows {
        entity_type: String,
        navigation: String,
        count: usize,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Render a composite key for messages.
pub fn format_key(key: &[KeyValue]) -> String {
    key.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
