//! Error types for the softdel-services crate.
//!
//! Only configuration, validation, store and usage failures are errors.
//! Domain outcomes (already deleted, not found, wrong level) are reported in
//! a failed `SoftDeleteStatus` instead.

use thiserror::Error;

use softdel_core::{ConfigError, ValidationError};
use softdel_store::StoreError;

#[derive(Error, Debug)]
pub enum SoftDeleteError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Expected a sync task, but {operation} suspended")]
    SyncOverAsync { operation: &'static str },

    #[error("Cascade below {entity_type} is deeper than {max} levels")]
    CascadeTooDeep { entity_type: String, max: u8 },
}

pub type Result<T> = std::result::Result<T, SoftDeleteError>;
