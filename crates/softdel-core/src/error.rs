use thiserror::Error;

use crate::capability::Marker;
use crate::record::{KeyKind, RecordId};

/// Errors in the bindings a service is constructed with. Never recoverable
/// at call time.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("You must set the soft delete value getter for the {capability} capability")]
    MissingGetter { capability: &'static str },

    #[error("You must set the soft delete value setter for the {capability} capability")]
    MissingSetter { capability: &'static str },

    #[error("The filter parameter for {marker} must be the same in all usages, i.e. {expected} (found {found})")]
    FilterBindingMismatch {
        marker: Marker,
        expected: String,
        found: String,
    },

    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),
}

/// Errors raised at the start of an operation, before anything is mutated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Record {0} is not tracked by this store")]
    UnknownRecord(RecordId),

    #[error("The entity type {0} was not found in the model")]
    UnknownEntityType(String),

    #[error("The entity type {0} is an owned type and can't be loaded on its own")]
    OwnedEntityType(String),

    #[error("The entity type {0} has no primary key")]
    NoPrimaryKey(String),

    #[error("Mismatch in keys: you provided {provided} key(s) and the entity has {expected} key(s)")]
    KeyCountMismatch { provided: usize, expected: usize },

    #[error("Mismatch in keys: your provided key {position} (of {count}) is of type {provided} but entity key's type is {expected}")]
    KeyTypeMismatch {
        position: usize,
        count: usize,
        provided: KeyKind,
        expected: KeyKind,
    },

    #[error("You cannot soft delete a one-to-one relationship. It causes problems if you try to create a new version.")]
    OneToOne { entity_type: String },

    #[error("The entity type {entity_type} does not declare the {marker} capability")]
    MissingCapability { entity_type: String, marker: String },
}
