//! Create and Update views of entity types.
//!
//! Variants re-walk the compiled fields of the base type and differ from it
//! only in which fields they keep and whether they carry a required set.

use crate::descriptor::{Primitive, StringFormat, TypeDescriptor};
use crate::registry::SchemaKey;
use crate::schema_generator::{CompiledField, Schema, SchemaGenerator};
use convert_case::{Case, Casing};
use log::debug;
use serde::{Deserialize, Serialize};

/// Which view of a type is being compiled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum VariantKind {
    /// The type as declared
    Full,
    /// Request body for creating an entity
    Create,
    /// Request body for a partial update
    Update,
}

/// Field names that are always assigned by the server.
const SERVER_ASSIGNED_NAMES: &[&str] = &["id", "created_at", "updated_at", "deleted_at"];

impl VariantKind {
    fn prefix(&self) -> &'static str {
        match self {
            VariantKind::Full => "",
            VariantKind::Create => "Create",
            VariantKind::Update => "Update",
        }
    }

    /// Variant name for a base schema name, keeping any module qualifier:
    /// `Item` becomes `CreateItem`, `billing.Item` becomes `billing.CreateItem`.
    pub fn name_for(&self, base: &str) -> String {
        match base.rsplit_once('.') {
            Some((qualifier, bare)) => format!("{}.{}{}", qualifier, self.prefix(), bare),
            None => format!("{}{}", self.prefix(), base),
        }
    }
}

/// Whether a field is assigned by the server and so never sent by clients.
pub fn is_server_assigned(field: &CompiledField) -> bool {
    if field.directive.is_server_assigned() {
        return true;
    }

    let snake = field.field_name.to_case(Case::Snake);
    if SERVER_ASSIGNED_NAMES.contains(&snake.as_str())
        || SERVER_ASSIGNED_NAMES.contains(&field.name.to_case(Case::Snake).as_str())
    {
        return true;
    }

    // Timestamps named like bookkeeping columns (`created`, `last_updated_on`, ...)
    let is_timestamp = matches!(
        field.ty.unwrap_optional(),
        TypeDescriptor::Primitive(Primitive::Formatted(StringFormat::DateTime))
    );
    is_timestamp
        && ["created", "updated", "deleted"]
            .iter()
            .any(|marker| snake.contains(marker))
}

impl<'c> SchemaGenerator<'c> {
    /// Compile the requested view of a type.
    ///
    /// `Full` is [`compile`](SchemaGenerator::compile). `Create` and `Update`
    /// only exist for structs; any other descriptor compiles as-is. A variant
    /// that was already compiled comes back as a reference to the existing
    /// entry.
    pub fn variant(&mut self, ty: &TypeDescriptor, kind: VariantKind) -> Schema {
        if kind == VariantKind::Full {
            return self.compile(ty);
        }

        let catalog = self.catalog();
        let identity = match ty.unwrap_optional() {
            TypeDescriptor::Object(identity)
                if catalog.get(identity).map_or(false, |def| def.is_struct()) =>
            {
                identity
            }
            other => {
                debug!("No {:?} variant for {}, compiling as-is", kind, other.display_name());
                return self.compile(ty);
            }
        };

        let base = self.compile(ty);
        let base_name = base
            .ref_name()
            .map(str::to_string)
            .unwrap_or_else(|| identity.name.clone());

        let key = SchemaKey::new(identity.clone(), kind);
        let (is_new, name) = self
            .registry_mut()
            .register_or_ref(&key, &kind.name_for(&base_name));
        if !is_new {
            return Schema::reference(&name);
        }

        debug!("Compiling {:?} variant {} for {}", kind, name, identity);
        self.registry_mut().mark_in_progress(&key);
        // Every readOnly source makes a field server-assigned, so neither
        // variant carries readOnly marks.
        let include = |field: &CompiledField| !is_server_assigned(field);
        let schema = self.compile_object_body(identity, include, kind == VariantKind::Create);
        self.registry_mut().clear(&key);
        self.registry_mut().put(&name, schema);

        Schema::reference(&name)
    }
}
