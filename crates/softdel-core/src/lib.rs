//! softdel-core: Shared types, configuration, and error handling for cascade soft delete.
//!
//! This crate provides the foundational types used across the softdel crates:
//! - Records, key values, and tracked record handles
//! - Entity model metadata (entity types, relationships, delete behaviors)
//! - Capability markers (single-level flag, cascade level, owner identity)
//! - The query filter builder used for default scopes and level filters
//! - Configuration bindings and settings
//! - The structured status returned by every service operation
//! - Common error types

pub mod capability;
pub mod config;
pub mod error;
pub mod filter;
pub mod model;
pub mod record;
pub mod status;

pub use capability::{CascadeSoftDelete, DeleteCapability, Marker, SingleSoftDelete};
pub use config::{
    Bindings, SoftDeleteConfig, SoftDeleteSettings, SOFT_DELETED_PROPERTY,
    SOFT_DELETE_LEVEL_PROPERTY,
};
pub use error::{ConfigError, ValidationError};
pub use filter::{RecordFilter, ScopeFilter, ScopeFilters, ValueGetter, ValueSetter};
pub use model::{
    DeleteBehavior, EntityModel, EntityTypeDef, KeyProperty, ModelError, Multiplicity,
    Navigation, RelationshipDef,
};
pub use record::{KeyKind, KeyValue, Record, RecordId};
pub use status::SoftDeleteStatus;
