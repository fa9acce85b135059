//! Records, primary key values, and tracked record handles.
//!
//! A record is a row of some entity type with its properties held as a JSON
//! object, so getters and setters can bind either a conventional field or a
//! storage-only ("shadow") one.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

// ── Handles ──────────────────────────────────────────────────────

/// Handle to a record instance tracked by a store.
///
/// Equality is identity of the tracked instance, not of the row: two handles
/// may describe the same row if a caller attaches a second copy of it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// ── Keys ─────────────────────────────────────────────────────────

/// Storage type of a primary or foreign key property.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum KeyKind {
    Int,
    Text,
    Uuid,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Int => "int",
            Self::Text => "text",
            Self::Uuid => "uuid",
        };
        f.write_str(name)
    }
}

/// A single primary or foreign key value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(untagged)]
pub enum KeyValue {
    Int(i64),
    Uuid(Uuid),
    Text(String),
}

impl KeyValue {
    pub fn kind(&self) -> KeyKind {
        match self {
            Self::Int(_) => KeyKind::Int,
            Self::Uuid(_) => KeyKind::Uuid,
            Self::Text(_) => KeyKind::Text,
        }
    }

    /// The JSON form stored in record properties.
    pub fn to_json(&self) -> Value {
        match self {
            Self::Int(v) => Value::from(*v),
            Self::Uuid(v) => Value::String(v.to_string()),
            Self::Text(v) => Value::String(v.clone()),
        }
    }

    /// Read a key of the given kind from a property value.
    pub fn from_json(kind: KeyKind, value: &Value) -> Option<Self> {
        match kind {
            KeyKind::Int => value.as_i64().map(Self::Int),
            KeyKind::Text => value.as_str().map(|s| Self::Text(s.to_string())),
            KeyKind::Uuid => value
                .as_str()
                .and_then(|s| Uuid::parse_str(s).ok())
                .map(Self::Uuid),
        }
    }

    /// Parse a key of the given kind from command-line text.
    pub fn parse(kind: KeyKind, raw: &str) -> Option<Self> {
        match kind {
            KeyKind::Int => raw.parse().ok().map(Self::Int),
            KeyKind::Text => Some(Self::Text(raw.to_string())),
            KeyKind::Uuid => Uuid::parse_str(raw).ok().map(Self::Uuid),
        }
    }
}

impl fmt::Display for KeyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{v}"),
            Self::Uuid(v) => write!(f, "{v}"),
            Self::Text(v) => write!(f, "{v:?}"),
        }
    }
}

impl From<i64> for KeyValue {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for KeyValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<Uuid> for KeyValue {
    fn from(v: Uuid) -> Self {
        Self::Uuid(v)
    }
}

impl From<&str> for KeyValue {
    fn from(v: &str) -> Self {
        Self::Text(v.to_string())
    }
}

impl From<String> for KeyValue {
    fn from(v: String) -> Self {
        Self::Text(v)
    }
}

// ── Records ──────────────────────────────────────────────────────

/// A row of an entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub entity_type: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
}

impl Record {
    pub fn new(entity_type: impl Into<String>) -> Self {
        Self {
            entity_type: entity_type.into(),
            properties: Map::new(),
        }
    }

    /// Build a record from a JSON object. Non-object values give an empty record.
    pub fn from_json(entity_type: impl Into<String>, properties: Value) -> Self {
        let properties = match properties {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            entity_type: entity_type.into(),
            properties,
        }
    }

    pub fn property(&self, name: &str) -> Option<&Value> {
        self.properties.get(name)
    }

    pub fn set_property(&mut self, name: &str, value: impl Into<Value>) {
        self.properties.insert(name.to_string(), value.into());
    }

    /// Numeric property narrowed to `u8`. Absent or null reads as 0; a value
    /// that is not a number in `0..=255` reads as `u8::MAX`, so a corrupt
    /// level never looks active.
    pub fn u8_property(&self, name: &str) -> u8 {
        match self.property(name) {
            None | Some(Value::Null) => 0,
            Some(value) => match value.as_u64().and_then(|v| u8::try_from(v).ok()) {
                Some(v) => v,
                None => {
                    tracing::warn!(
                        entity_type = %self.entity_type,
                        property = name,
                        %value,
                        "Property is not a u8, reading it as the maximum"
                    );
                    u8::MAX
                }
            },
        }
    }

    /// Boolean property; absent or null reads as `false`.
    pub fn bool_property(&self, name: &str) -> bool {
        self.property(name)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn str_property(&self, name: &str) -> Option<&str> {
        self.property(name).and_then(Value::as_str)
    }

    pub fn uuid_property(&self, name: &str) -> Option<Uuid> {
        self.str_property(name)
            .and_then(|s| Uuid::parse_str(s).ok())
    }
}
