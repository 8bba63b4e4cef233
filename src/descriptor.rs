//! Static type model consumed by the schema compiler.
//!
//! Types are described once, ahead of compilation, as plain data. Struct and
//! enum definitions live in a [`TypeCatalog`] keyed by [`TypeIdentity`]; a
//! [`TypeDescriptor`] refers to them by identity rather than by nesting, so a
//! self-referential type such as `struct Node { children: Vec<Node> }` is a
//! finite value.

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Identity of a named type: the module that defines it plus its bare name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TypeIdentity {
    /// Rust module path, e.g. `crate` or `billing::models`
    pub module: String,
    /// Bare type name, e.g. `Item`
    pub name: String,
}

impl TypeIdentity {
    pub fn new(module: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            module: module.into(),
            name: name.into(),
        }
    }

    /// `module::Name`
    pub fn qualified(&self) -> String {
        format!("{}::{}", self.module, self.name)
    }
}

impl fmt::Display for TypeIdentity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}::{}", self.module, self.name)
    }
}

/// Well-known value types that serialize as strings with a semantic format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StringFormat {
    DateTime,
    Date,
    Time,
    Duration,
    Uuid,
    Uri,
    Email,
    Ipv4,
    Ipv6,
    Ip,
    Decimal,
}

impl StringFormat {
    /// The OpenAPI `format` keyword value
    pub fn as_str(&self) -> &'static str {
        match self {
            StringFormat::DateTime => "date-time",
            StringFormat::Date => "date",
            StringFormat::Time => "time",
            StringFormat::Duration => "duration",
            StringFormat::Uuid => "uuid",
            StringFormat::Uri => "uri",
            StringFormat::Email => "email",
            StringFormat::Ipv4 => "ipv4",
            StringFormat::Ipv6 => "ipv6",
            StringFormat::Ip => "ip",
            StringFormat::Decimal => "decimal",
        }
    }
}

/// Scalar kinds with a fixed schema shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Primitive {
    Bool,
    Integer { bits: u16, signed: bool },
    Float { bits: u16 },
    String,
    Char,
    /// Byte sequences, emitted as base64 strings
    Bytes,
    Formatted(StringFormat),
}

/// Structural description of a type, independent of any value.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeDescriptor {
    Primitive(Primitive),
    Array(Box<TypeDescriptor>),
    /// String-keyed map; the descriptor is the value type
    Map(Box<TypeDescriptor>),
    Optional(Box<TypeDescriptor>),
    /// A struct or enum defined in the catalog
    Object(TypeIdentity),
    /// Intentionally untyped (`serde_json::Value`, tuples)
    Opaque,
    /// A named type with no definition in the catalog
    Unresolved(String),
}

impl TypeDescriptor {
    pub fn array(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Array(Box::new(inner))
    }

    pub fn map(value: TypeDescriptor) -> Self {
        TypeDescriptor::Map(Box::new(value))
    }

    pub fn optional(inner: TypeDescriptor) -> Self {
        TypeDescriptor::Optional(Box::new(inner))
    }

    pub fn object(module: impl Into<String>, name: impl Into<String>) -> Self {
        TypeDescriptor::Object(TypeIdentity::new(module, name))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, TypeDescriptor::Optional(_))
    }

    /// Strips every `Optional` layer.
    pub fn unwrap_optional(&self) -> &TypeDescriptor {
        let mut current = self;
        while let TypeDescriptor::Optional(inner) = current {
            current = inner;
        }
        current
    }

    /// Rust-like rendering for log messages
    pub fn display_name(&self) -> String {
        match self {
            TypeDescriptor::Primitive(p) => format!("{:?}", p),
            TypeDescriptor::Array(inner) => format!("Vec<{}>", inner.display_name()),
            TypeDescriptor::Map(inner) => format!("Map<String, {}>", inner.display_name()),
            TypeDescriptor::Optional(inner) => format!("Option<{}>", inner.display_name()),
            TypeDescriptor::Object(identity) => identity.qualified(),
            TypeDescriptor::Opaque => "Opaque".to_string(),
            TypeDescriptor::Unresolved(name) => name.clone(),
        }
    }
}

/// Raw annotation text for each metadata namespace of one field.
///
/// These strings are only ever interpreted by [`crate::metadata`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldTags {
    /// Contents of `#[serde(...)]`
    pub serialization: String,
    /// Contents of `#[validate(...)]`
    pub validation: String,
    /// Contents of `#[db(...)]`
    pub persistence: String,
    /// Contents of `#[docs(...)]`
    pub docs: String,
}

impl FieldTags {
    pub fn serde(mut self, raw: &str) -> Self {
        self.serialization = raw.to_string();
        self
    }

    pub fn validate(mut self, raw: &str) -> Self {
        self.validation = raw.to_string();
        self
    }

    pub fn db(mut self, raw: &str) -> Self {
        self.persistence = raw.to_string();
        self
    }

    pub fn docs(mut self, raw: &str) -> Self {
        self.docs = raw.to_string();
        self
    }
}

/// A single declared field of a struct.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDeclaration {
    pub name: String,
    pub ty: TypeDescriptor,
    /// Fields of an embedded struct are hoisted into the parent
    #[serde(default)]
    pub embedded: bool,
    #[serde(default)]
    pub tags: FieldTags,
    /// Doc comment, used as a fallback description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl FieldDeclaration {
    pub fn new(name: impl Into<String>, ty: TypeDescriptor) -> Self {
        Self {
            name: name.into(),
            ty,
            embedded: false,
            tags: FieldTags::default(),
            doc: None,
        }
    }

    pub fn with_tags(mut self, tags: FieldTags) -> Self {
        self.tags = tags;
        self
    }

    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeBody {
    Struct { fields: Vec<FieldDeclaration> },
    /// Unit-only enum, documented as a string enum
    Enum { variants: Vec<String> },
}

/// A named type definition stored in the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDef {
    pub identity: TypeIdentity,
    pub body: TypeBody,
    /// Container-level `#[serde(rename_all = "...")]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rename_all: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doc: Option<String>,
}

impl TypeDef {
    pub fn structure(identity: TypeIdentity, fields: Vec<FieldDeclaration>) -> Self {
        Self {
            identity,
            body: TypeBody::Struct { fields },
            rename_all: None,
            doc: None,
        }
    }

    pub fn enumeration(identity: TypeIdentity, variants: Vec<String>) -> Self {
        Self {
            identity,
            body: TypeBody::Enum { variants },
            rename_all: None,
            doc: None,
        }
    }

    pub fn with_rename_all(mut self, rule: impl Into<String>) -> Self {
        self.rename_all = Some(rule.into());
        self
    }

    pub fn is_struct(&self) -> bool {
        matches!(self.body, TypeBody::Struct { .. })
    }

    /// Declared fields; empty for enums.
    pub fn fields(&self) -> &[FieldDeclaration] {
        match &self.body {
            TypeBody::Struct { fields } => fields,
            TypeBody::Enum { .. } => &[],
        }
    }
}

/// A field after embedded structs have been hoisted, with the type that declares it.
#[derive(Debug, Clone, Copy)]
pub struct FlatField<'a> {
    pub owner: &'a TypeDef,
    pub field: &'a FieldDeclaration,
}

/// Every known struct and enum, keyed by identity.
///
/// Iteration order is the identity order, which keeps every walk over the
/// catalog deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<TypeDef>", into = "Vec<TypeDef>")]
pub struct TypeCatalog {
    types: BTreeMap<TypeIdentity, TypeDef>,
}

impl From<Vec<TypeDef>> for TypeCatalog {
    fn from(defs: Vec<TypeDef>) -> Self {
        let mut catalog = TypeCatalog::new();
        for def in defs {
            catalog.insert(def);
        }
        catalog
    }
}

impl From<TypeCatalog> for Vec<TypeDef> {
    fn from(catalog: TypeCatalog) -> Self {
        catalog.types.into_values().collect()
    }
}

impl TypeCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a definition, replacing any earlier one with the same identity.
    pub fn insert(&mut self, def: TypeDef) {
        if self.types.contains_key(&def.identity) {
            warn!("Duplicate definition for {}, keeping the last one", def.identity);
        }
        self.types.insert(def.identity.clone(), def);
    }

    pub fn get(&self, identity: &TypeIdentity) -> Option<&TypeDef> {
        self.types.get(identity)
    }

    pub fn contains(&self, identity: &TypeIdentity) -> bool {
        self.types.contains_key(identity)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TypeDef> {
        self.types.values()
    }

    /// Looks a type up by bare name (`Item`) or path (`billing::Item`,
    /// `crate::billing::Item`).
    ///
    /// A bare name shared by several modules resolves to the first identity in
    /// catalog order.
    pub fn find(&self, path: &str) -> Option<&TypeDef> {
        let path = path.trim();
        if let Some(rest) = path.strip_prefix("crate::") {
            if !rest.contains("::") {
                return self.types.get(&TypeIdentity::new("crate", rest));
            }
        }
        let path = path.strip_prefix("crate::").unwrap_or(path);
        match path.rsplit_once("::") {
            Some((module, name)) => self.types.values().find(|def| {
                def.identity.name == name
                    && (def.identity.module == module
                        || def.identity.module.ends_with(&format!("::{}", module))
                        || def.identity.module == format!("crate::{}", module))
            }),
            None => {
                let mut matches = self.types.values().filter(|def| def.identity.name == path);
                let first = matches.next();
                if first.is_some() && matches.next().is_some() {
                    debug!("Type name {} is ambiguous, using {}", path, first.map(|d| d.identity.qualified()).unwrap_or_default());
                }
                first
            }
        }
    }

    /// Like [`find`](Self::find), but a bare name prefers a definition from `module`.
    pub fn find_from(&self, path: &str, module: &str) -> Option<&TypeDef> {
        if !path.contains("::") {
            let local = TypeIdentity::new(module, path.trim());
            if let Some(def) = self.types.get(&local) {
                return Some(def);
            }
        }
        self.find(path)
    }

    /// The fields of a struct with embedded struct fields hoisted in place,
    /// recursively.
    ///
    /// An embedded field whose type is not a struct in the catalog stays a
    /// regular field. Embedding cycles are cut at the repeated type.
    pub fn flattened_fields(&self, identity: &TypeIdentity) -> Vec<FlatField<'_>> {
        let mut out = Vec::new();
        if let Some(def) = self.types.get(identity) {
            let mut stack = vec![&def.identity];
            self.collect_fields(def, &mut stack, &mut out);
        }
        out
    }

    fn collect_fields<'a>(
        &'a self,
        def: &'a TypeDef,
        stack: &mut Vec<&'a TypeIdentity>,
        out: &mut Vec<FlatField<'a>>,
    ) {
        for field in def.fields() {
            if field.embedded {
                if let TypeDescriptor::Object(inner) = field.ty.unwrap_optional() {
                    if let Some(inner_def) = self.types.get(inner).filter(|d| d.is_struct()) {
                        if stack.contains(&&inner_def.identity) {
                            warn!(
                                "Embedding cycle through {} in {}, skipping field {}",
                                inner, def.identity, field.name
                            );
                            continue;
                        }
                        stack.push(&inner_def.identity);
                        self.collect_fields(inner_def, stack, out);
                        stack.pop();
                        continue;
                    }
                }
            }
            out.push(FlatField { owner: def, field });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn string() -> TypeDescriptor {
        TypeDescriptor::Primitive(Primitive::String)
    }

    fn sample_catalog() -> TypeCatalog {
        let mut catalog = TypeCatalog::new();
        catalog.insert(TypeDef::structure(
            TypeIdentity::new("crate::models", "Timestamps"),
            vec![
                FieldDeclaration::new("created_at", TypeDescriptor::Primitive(Primitive::Formatted(StringFormat::DateTime))),
                FieldDeclaration::new("updated_at", TypeDescriptor::Primitive(Primitive::Formatted(StringFormat::DateTime))),
            ],
        ));
        catalog.insert(TypeDef::structure(
            TypeIdentity::new("crate::models", "User"),
            vec![
                FieldDeclaration::new("name", string()),
                FieldDeclaration::new("meta", TypeDescriptor::object("crate::models", "Timestamps")).embedded(),
            ],
        ));
        catalog.insert(TypeDef::structure(TypeIdentity::new("crate::billing", "Item"), vec![]));
        catalog.insert(TypeDef::structure(TypeIdentity::new("crate::inventory", "Item"), vec![]));
        catalog
    }

    #[test]
    fn test_find_by_bare_and_qualified_name() {
        let catalog = sample_catalog();

        assert_eq!(catalog.find("User").unwrap().identity.module, "crate::models");
        assert_eq!(
            catalog.find("inventory::Item").unwrap().identity,
            TypeIdentity::new("crate::inventory", "Item")
        );
        assert_eq!(
            catalog.find("crate::billing::Item").unwrap().identity,
            TypeIdentity::new("crate::billing", "Item")
        );
        // Ambiguous bare names resolve to the first identity in order
        assert_eq!(catalog.find("Item").unwrap().identity.module, "crate::billing");
        assert!(catalog.find("Missing").is_none());
    }

    #[test]
    fn test_find_from_prefers_local_module() {
        let catalog = sample_catalog();
        let def = catalog.find_from("Item", "crate::inventory").unwrap();
        assert_eq!(def.identity.module, "crate::inventory");
    }

    #[test]
    fn test_flattened_fields_hoists_embedded_struct() {
        let catalog = sample_catalog();
        let fields = catalog.flattened_fields(&TypeIdentity::new("crate::models", "User"));
        let names: Vec<_> = fields.iter().map(|f| f.field.name.as_str()).collect();

        assert_eq!(names, vec!["name", "created_at", "updated_at"]);
        assert_eq!(fields[1].owner.identity.name, "Timestamps");
    }

    #[test]
    fn test_flattened_fields_cuts_embedding_cycle() {
        let mut catalog = TypeCatalog::new();
        catalog.insert(TypeDef::structure(
            TypeIdentity::new("crate", "A"),
            vec![
                FieldDeclaration::new("a", string()),
                FieldDeclaration::new("b", TypeDescriptor::object("crate", "B")).embedded(),
            ],
        ));
        catalog.insert(TypeDef::structure(
            TypeIdentity::new("crate", "B"),
            vec![
                FieldDeclaration::new("b", string()),
                FieldDeclaration::new("a", TypeDescriptor::object("crate", "A")).embedded(),
            ],
        ));

        let fields = catalog.flattened_fields(&TypeIdentity::new("crate", "A"));
        let names: Vec<_> = fields.iter().map(|f| f.field.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_embedded_non_struct_stays_regular_field() {
        let mut catalog = TypeCatalog::new();
        catalog.insert(TypeDef::structure(
            TypeIdentity::new("crate", "Wrapper"),
            vec![FieldDeclaration::new("extra", TypeDescriptor::map(string())).embedded()],
        ));

        let fields = catalog.flattened_fields(&TypeIdentity::new("crate", "Wrapper"));
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].field.name, "extra");
    }

    #[test]
    fn test_catalog_serializes_as_definition_list() {
        let catalog = sample_catalog();
        let json = serde_json::to_value(&catalog).unwrap();
        assert!(json.is_array());
        assert_eq!(json.as_array().unwrap().len(), 4);

        let restored: TypeCatalog = serde_json::from_value(json).unwrap();
        assert_eq!(restored, catalog);
    }

    #[test]
    fn test_unwrap_optional_strips_all_layers() {
        let ty = TypeDescriptor::optional(TypeDescriptor::optional(string()));
        assert_eq!(ty.unwrap_optional(), &string());
        assert_eq!(ty.display_name(), "Option<Option<String>>");
    }
}
