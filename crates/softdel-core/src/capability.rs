//! Capability markers an entity type can declare.
//!
//! A capability is a compile-time type (`SingleSoftDelete`, `CascadeSoftDelete`,
//! or one the caller defines) selecting the delete-value type a service works
//! with. Entity types opt in by listing the capability's `Marker` in the model.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Marker name for records carrying an owner/tenant identity.
pub const USER_ID_MARKER: &str = "UserId";

/// A delete-state capability: the value type of its delete field and the
/// value that means "active".
pub trait DeleteCapability: Send + Sync + 'static {
    type Value: Copy + PartialEq + fmt::Debug + Send + Sync + 'static;

    /// Name entity types list in the model to declare this capability.
    const MARKER: &'static str;

    /// The delete value of a visible record.
    const ACTIVE: Self::Value;
}

/// Single-level soft delete: a boolean flag.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleSoftDelete;

impl DeleteCapability for SingleSoftDelete {
    type Value = bool;
    const MARKER: &'static str = "SingleSoftDelete";
    const ACTIVE: bool = false;
}

/// Multi-level cascade soft delete: the depth at which a record was deleted.
#[derive(Debug, Clone, Copy, Default)]
pub struct CascadeSoftDelete;

impl DeleteCapability for CascadeSoftDelete {
    type Value = u8;
    const MARKER: &'static str = "CascadeSoftDelete";
    const ACTIVE: u8 = 0;
}

/// Name of a capability declared by an entity type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Marker(String);

impl Marker {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// The marker of a delete capability.
    pub fn of<C: DeleteCapability>() -> Self {
        Self(C::MARKER.to_string())
    }

    /// The owner/tenant identity marker.
    pub fn user_id() -> Self {
        Self(USER_ID_MARKER.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Marker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Marker {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}
