//! Association detection between entity types.
//!
//! Relationships are read off the shape of a struct's fields and a few naming
//! conventions. They never change a schema body; they are attached as an
//! `x-relationships` extension for documentation consumers.

use crate::descriptor::{TypeDescriptor, TypeIdentity};
use crate::schema_generator::{Schema, SchemaGenerator};
use log::debug;
use serde::{Deserialize, Serialize};

/// Extension keyword the relationships are published under
pub const RELATIONSHIPS_EXTENSION: &str = "x-relationships";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

/// One association from an entity field to another entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipInfo {
    /// Emitted property name of the owning field
    pub field: String,
    pub kind: RelationshipKind,
    /// Schema name of the related entity
    pub related: String,
}

/// Attaches relationships to an entity schema. An empty list leaves it untouched.
pub fn attach(schema: &mut Schema, relationships: &[RelationshipInfo]) {
    if relationships.is_empty() {
        return;
    }
    let entries = relationships
        .iter()
        .map(|rel| {
            serde_json::json!({
                "field": rel.field,
                "kind": rel.kind,
                "$ref": Schema::reference(&rel.related).reference,
            })
        })
        .collect();
    schema
        .extensions
        .insert(RELATIONSHIPS_EXTENSION.to_string(), serde_json::Value::Array(entries));
}

impl<'c> SchemaGenerator<'c> {
    /// Classify the associations of a struct's fields.
    ///
    /// Arrays of structs are one-to-many, or many-to-many with a persistence
    /// `many_to_many` hint. A struct-valued field is one-to-one, or
    /// many-to-one when a sibling `<field>_id`, `<field>Id` or `<field>ID`
    /// exists or a `foreign_key` hint is present. Related types are compiled
    /// so their schema names are known.
    pub fn detect_relationships(&mut self, ty: &TypeDescriptor) -> Vec<RelationshipInfo> {
        let catalog = self.catalog();
        let TypeDescriptor::Object(identity) = ty.unwrap_optional() else {
            return Vec::new();
        };
        if !catalog.get(identity).map_or(false, |def| def.is_struct()) {
            return Vec::new();
        }

        let declared: Vec<&str> = catalog
            .flattened_fields(identity)
            .iter()
            .map(|flat| flat.field.name.as_str())
            .collect();

        let mut relationships = Vec::new();
        for field in self.compile_fields(identity) {
            let (target, many) = match field.ty.unwrap_optional() {
                TypeDescriptor::Array(element) => (self.entity(element), true),
                other => (self.entity(other), false),
            };
            let Some(target) = target else {
                continue;
            };

            let kind = if many {
                if field.directive.join_table.is_some() {
                    RelationshipKind::ManyToMany
                } else {
                    RelationshipKind::OneToMany
                }
            } else {
                let base = &field.field_name;
                let has_key_field = [
                    format!("{}_id", base),
                    format!("{}Id", base),
                    format!("{}ID", base),
                ]
                .iter()
                .any(|candidate| declared.contains(&candidate.as_str()));
                if has_key_field || field.directive.foreign_key.is_some() {
                    RelationshipKind::ManyToOne
                } else {
                    RelationshipKind::OneToOne
                }
            };

            let related = self
                .compile(&TypeDescriptor::Object(target.clone()))
                .ref_name()
                .map(str::to_string)
                .unwrap_or_else(|| target.name.clone());
            debug!("{} field {} is {:?} {}", identity, field.name, kind, related);
            relationships.push(RelationshipInfo {
                field: field.name,
                kind,
                related,
            });
        }
        relationships
    }

    /// The identity of a struct type behind a descriptor, if any.
    fn entity(&self, ty: &TypeDescriptor) -> Option<TypeIdentity> {
        match ty.unwrap_optional() {
            TypeDescriptor::Object(identity)
                if self.catalog().get(identity).map_or(false, |def| def.is_struct()) =>
            {
                Some(identity.clone())
            }
            _ => None,
        }
    }
}
