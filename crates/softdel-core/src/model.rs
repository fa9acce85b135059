//! Entity model metadata: entity types, primary keys, relationships and
//! their delete behaviors.
//!
//! The walker only follows navigations from a principal to its dependents
//! whose relationship is tagged `Cascade` or `ClientCascade`; everything else
//! in the model exists for the store (foreign keys, database-side delete
//! rules) and for precondition checks (one-to-one, owned types, key shape).

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::capability::{DeleteCapability, Marker};
use crate::record::{KeyKind, KeyValue, Record};

/// Errors in a model definition.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    #[error("Entity type {0} is defined more than once")]
    DuplicateEntityType(String),

    #[error("Relationship {principal} -> {dependent} refers to unknown entity type {name}")]
    UnknownEntityType {
        principal: String,
        dependent: String,
        name: String,
    },

    #[error("Relationship {principal} -> {dependent} has {found} foreign key propert(ies) but the principal key has {expected}")]
    ForeignKeyArity {
        principal: String,
        dependent: String,
        expected: usize,
        found: usize,
    },
}

/// What the store does to dependents when a principal is removed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeleteBehavior {
    /// Database deletes dependents.
    Cascade,
    /// Tracked dependents are deleted by the client; untracked ones block the delete.
    ClientCascade,
    SetNull,
    ClientSetNull,
    #[default]
    Restrict,
    NoAction,
}

impl DeleteBehavior {
    /// Whether a cascade soft delete follows relationships with this behavior.
    pub fn is_cascade(self) -> bool {
        matches!(self, Self::Cascade | Self::ClientCascade)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Multiplicity {
    #[default]
    OneToMany,
    OneToOne,
}

/// A primary key property.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct KeyProperty {
    pub name: String,
    pub kind: KeyKind,
}

/// An entity type known to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityTypeDef {
    pub name: String,
    /// Owned (value) types live inside their owner and have no identity of their own.
    #[serde(default)]
    pub owned: bool,
    #[serde(default)]
    pub primary_key: Vec<KeyProperty>,
    #[serde(default)]
    pub markers: BTreeSet<Marker>,
}

impl EntityTypeDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            owned: false,
            primary_key: Vec::new(),
            markers: BTreeSet::new(),
        }
    }

    /// Append a primary key property.
    pub fn key(mut self, name: impl Into<String>, kind: KeyKind) -> Self {
        self.primary_key.push(KeyProperty {
            name: name.into(),
            kind,
        });
        self
    }

    pub fn marker(mut self, marker: impl Into<Marker>) -> Self {
        self.markers.insert(marker.into());
        self
    }

    /// Declare a delete capability.
    pub fn capability<C: DeleteCapability>(self) -> Self {
        self.marker(Marker::of::<C>())
    }

    pub fn owned(mut self) -> Self {
        self.owned = true;
        self
    }

    pub fn has_marker(&self, marker: &Marker) -> bool {
        self.markers.contains(marker)
    }

    pub fn implements<C: DeleteCapability>(&self) -> bool {
        self.markers.iter().any(|m| m.as_str() == C::MARKER)
    }

    /// Primary key values of a record of this type, if all are present.
    pub fn key_of(&self, record: &Record) -> Option<Vec<KeyValue>> {
        self.primary_key
            .iter()
            .map(|p| {
                record
                    .property(&p.name)
                    .and_then(|v| KeyValue::from_json(p.kind, v))
            })
            .collect()
    }
}

/// A relationship between a principal entity type and its dependents.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RelationshipDef {
    pub principal: String,
    pub dependent: String,
    /// Navigation on the principal leading to the dependent(s).
    #[serde(default)]
    pub principal_navigation: Option<String>,
    /// Navigation on the dependent leading back to the principal.
    #[serde(default)]
    pub dependent_navigation: Option<String>,
    /// Dependent properties holding the principal's key, in key order.
    pub foreign_key: Vec<String>,
    #[serde(default)]
    pub multiplicity: Multiplicity,
    #[serde(default)]
    pub delete_behavior: DeleteBehavior,
}

impl RelationshipDef {
    pub fn one_to_many(
        principal: impl Into<String>,
        dependent: impl Into<String>,
        foreign_key: &[&str],
    ) -> Self {
        Self {
            principal: principal.into(),
            dependent: dependent.into(),
            principal_navigation: None,
            dependent_navigation: None,
            foreign_key: foreign_key.iter().map(|s| s.to_string()).collect(),
            multiplicity: Multiplicity::OneToMany,
            delete_behavior: DeleteBehavior::default(),
        }
    }

    pub fn one_to_one(
        principal: impl Into<String>,
        dependent: impl Into<String>,
        foreign_key: &[&str],
    ) -> Self {
        Self {
            multiplicity: Multiplicity::OneToOne,
            ..Self::one_to_many(principal, dependent, foreign_key)
        }
    }

    pub fn principal_navigation(mut self, name: impl Into<String>) -> Self {
        self.principal_navigation = Some(name.into());
        self
    }

    pub fn dependent_navigation(mut self, name: impl Into<String>) -> Self {
        self.dependent_navigation = Some(name.into());
        self
    }

    pub fn on_delete(mut self, behavior: DeleteBehavior) -> Self {
        self.delete_behavior = behavior;
        self
    }

    /// Foreign key values of a dependent record, typed by the principal key.
    /// `None` when any part is null or absent (an optional relationship not set).
    pub fn foreign_key_of(
        &self,
        dependent: &Record,
        principal: &EntityTypeDef,
    ) -> Option<Vec<KeyValue>> {
        self.foreign_key
            .iter()
            .zip(&principal.primary_key)
            .map(|(fk, pk)| {
                dependent
                    .property(fk)
                    .and_then(|v| KeyValue::from_json(pk.kind, v))
            })
            .collect()
    }
}

/// A navigation as seen from one entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    pub name: String,
    /// Index into `EntityModel::relationships`.
    pub relationship: usize,
    pub target: String,
    pub is_collection: bool,
    /// True when the navigation lives on the dependent and points at the principal.
    pub on_dependent: bool,
    pub delete_behavior: DeleteBehavior,
}

/// All entity types and relationships a store knows about.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EntityModel {
    #[serde(default)]
    entity_types: Vec<EntityTypeDef>,
    #[serde(default)]
    relationships: Vec<RelationshipDef>,
}

impl EntityModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_entity(mut self, def: EntityTypeDef) -> Self {
        self.entity_types.push(def);
        self
    }

    pub fn with_relationship(mut self, rel: RelationshipDef) -> Self {
        self.relationships.push(rel);
        self
    }

    /// Check that entity names are unique and relationships are consistent.
    pub fn validate(&self) -> Result<(), ModelError> {
        let mut seen = BTreeSet::new();
        for def in &self.entity_types {
            if !seen.insert(def.name.as_str()) {
                return Err(ModelError::DuplicateEntityType(def.name.clone()));
            }
        }

        for rel in &self.relationships {
            let unknown = |name: &str| ModelError::UnknownEntityType {
                principal: rel.principal.clone(),
                dependent: rel.dependent.clone(),
                name: name.to_string(),
            };
            let principal = self
                .entity_type(&rel.principal)
                .ok_or_else(|| unknown(&rel.principal))?;
            self.entity_type(&rel.dependent)
                .ok_or_else(|| unknown(&rel.dependent))?;

            if principal.primary_key.len() != rel.foreign_key.len() {
                return Err(ModelError::ForeignKeyArity {
                    principal: rel.principal.clone(),
                    dependent: rel.dependent.clone(),
                    expected: principal.primary_key.len(),
                    found: rel.foreign_key.len(),
                });
            }
        }
        Ok(())
    }

    pub fn entity_type(&self, name: &str) -> Option<&EntityTypeDef> {
        self.entity_types.iter().find(|d| d.name == name)
    }

    pub fn entity_types(&self) -> &[EntityTypeDef] {
        &self.entity_types
    }

    pub fn relationships(&self) -> &[RelationshipDef] {
        &self.relationships
    }

    pub fn relationship(&self, index: usize) -> Option<&RelationshipDef> {
        self.relationships.get(index)
    }

    /// Every navigation declared on an entity type, principal side first.
    pub fn navigations(&self, entity_type: &str) -> Vec<Navigation> {
        let mut navs = Vec::new();
        for (i, rel) in self.relationships.iter().enumerate() {
            if rel.principal == entity_type {
                if let Some(name) = &rel.principal_navigation {
                    navs.push(Navigation {
                        name: name.clone(),
                        relationship: i,
                        target: rel.dependent.clone(),
                        is_collection: rel.multiplicity == Multiplicity::OneToMany,
                        on_dependent: false,
                        delete_behavior: rel.delete_behavior,
                    });
                }
            }
        }
        for (i, rel) in self.relationships.iter().enumerate() {
            if rel.dependent == entity_type {
                if let Some(name) = &rel.dependent_navigation {
                    navs.push(Navigation {
                        name: name.clone(),
                        relationship: i,
                        target: rel.principal.clone(),
                        is_collection: false,
                        on_dependent: true,
                        delete_behavior: rel.delete_behavior,
                    });
                }
            }
        }
        navs
    }

    /// Navigations to dependents that a cascade soft delete follows.
    pub fn cascade_navigations(&self, entity_type: &str) -> Vec<Navigation> {
        self.navigations(entity_type)
            .into_iter()
            .filter(|n| !n.on_dependent && n.delete_behavior.is_cascade())
            .collect()
    }

    pub fn navigation(&self, entity_type: &str, name: &str) -> Option<Navigation> {
        self.navigations(entity_type)
            .into_iter()
            .find(|n| n.name == name)
    }

    /// Relationships in which `entity_type` is the dependent side.
    pub fn foreign_keys<'a>(
        &'a self,
        entity_type: &'a str,
    ) -> impl Iterator<Item = &'a RelationshipDef> + 'a {
        self.relationships
            .iter()
            .filter(move |r| r.dependent == entity_type)
    }

    /// Relationships in which `entity_type` is the principal side.
    pub fn dependents_of<'a>(
        &'a self,
        entity_type: &'a str,
    ) -> impl Iterator<Item = &'a RelationshipDef> + 'a {
        self.relationships
            .iter()
            .filter(move |r| r.principal == entity_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capability::CascadeSoftDelete;
    use serde_json::json;

    fn employee_model() -> EntityModel {
        EntityModel::new()
            .with_entity(
                EntityTypeDef::new("Employee")
                    .key("Id", KeyKind::Int)
                    .capability::<CascadeSoftDelete>(),
            )
            .with_entity(
                EntityTypeDef::new("EmployeeContract")
                    .key("Id", KeyKind::Int)
                    .capability::<CascadeSoftDelete>(),
            )
            .with_relationship(
                RelationshipDef::one_to_many("Employee", "Employee", &["ManagerId"])
                    .principal_navigation("WorksFromMe")
                    .dependent_navigation("Manager")
                    .on_delete(DeleteBehavior::ClientCascade),
            )
            .with_relationship(
                RelationshipDef::one_to_one("Employee", "EmployeeContract", &["EmployeeId"])
                    .principal_navigation("Contract")
                    .dependent_navigation("Employee")
                    .on_delete(DeleteBehavior::ClientCascade),
            )
    }

    #[test]
    fn test_self_referencing_navigations() {
        let model = employee_model();
        let navs = model.navigations("Employee");
        let names: Vec<_> = navs.iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["WorksFromMe", "Contract", "Manager"]);

        let works = &navs[0];
        assert!(works.is_collection);
        assert!(!works.on_dependent);
        assert_eq!(works.target, "Employee");

        let contract = &navs[1];
        assert!(!contract.is_collection);

        let manager = &navs[2];
        assert!(manager.on_dependent);
    }

    #[test]
    fn test_cascade_navigations_skip_dependent_side_and_restrict() {
        let model = employee_model().with_relationship(
            RelationshipDef::one_to_many("Employee", "EmployeeContract", &["ReviewerId"])
                .principal_navigation("Reviewed"),
        );
        let names: Vec<_> = model
            .cascade_navigations("Employee")
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["WorksFromMe", "Contract"]);
    }

    #[test]
    fn test_validate_rejects_unknown_type() {
        let model = employee_model().with_relationship(RelationshipDef::one_to_many(
            "Employee",
            "Missing",
            &["EmployeeId"],
        ));
        assert!(matches!(
            model.validate(),
            Err(ModelError::UnknownEntityType { name, .. }) if name == "Missing"
        ));
    }

    #[test]
    fn test_validate_rejects_fk_arity() {
        let model = employee_model().with_relationship(RelationshipDef::one_to_many(
            "Employee",
            "EmployeeContract",
            &["A", "B"],
        ));
        assert!(matches!(
            model.validate(),
            Err(ModelError::ForeignKeyArity { expected: 1, found: 2, .. })
        ));
        assert!(employee_model().validate().is_ok());
    }

    #[test]
    fn test_key_and_foreign_key_extraction() {
        let model = employee_model();
        let employee = model.entity_type("Employee").unwrap();
        let rel = &model.relationships()[0];

        let dev = Record::from_json("Employee", json!({"Id": 5, "ManagerId": 2}));
        assert_eq!(employee.key_of(&dev), Some(vec![KeyValue::Int(5)]));
        assert_eq!(rel.foreign_key_of(&dev, employee), Some(vec![KeyValue::Int(2)]));

        let ceo = Record::from_json("Employee", json!({"Id": 1, "ManagerId": null}));
        assert_eq!(rel.foreign_key_of(&ceo, employee), None);
    }

    #[test]
    fn test_model_json_round_trip_shape() {
        let model = employee_model();
        let json = serde_json::to_value(&model).unwrap();
        assert_eq!(json["relationships"][0]["delete_behavior"], "client_cascade");
        assert_eq!(json["relationships"][1]["multiplicity"], "one_to_one");
        let back: EntityModel = serde_json::from_value(json).unwrap();
        assert_eq!(back, model);
    }
}
