use crate::descriptor::{
    FieldDeclaration, Primitive, TypeBody, TypeCatalog, TypeDef, TypeDescriptor, TypeIdentity,
};
use crate::error::Degradation;
use crate::metadata::{merge_tags, MetadataDirective};
use crate::registry::{SchemaKey, SchemaRegistry};
use crate::variants::VariantKind;
use convert_case::{Case, Casing};
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};

const SCHEMA_REF_PREFIX: &str = "#/components/schemas/";

fn is_false(value: &bool) -> bool {
    !*value
}

/// OpenAPI Schema definition
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Reference to another schema
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Format hint (e.g., "int32", "date-time", "email")
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub deprecated: bool,
    #[serde(rename = "readOnly", default, skip_serializing_if = "is_false")]
    pub read_only: bool,
    #[serde(rename = "writeOnly", default, skip_serializing_if = "is_false")]
    pub write_only: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    #[serde(rename = "exclusiveMinimum", skip_serializing_if = "Option::is_none")]
    pub exclusive_minimum: Option<f64>,
    #[serde(rename = "exclusiveMaximum", skip_serializing_if = "Option::is_none")]
    pub exclusive_maximum: Option<f64>,
    #[serde(rename = "minLength", skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    #[serde(rename = "maxLength", skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(rename = "minItems", skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(rename = "maxItems", skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    /// Properties for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Schema>>,
    /// Required field names for object types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,
    /// Value schema for map types
    #[serde(rename = "additionalProperties", skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<Box<Schema>>,
    /// Enum values for enum types
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<String>>,
    #[serde(rename = "allOf", skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<Schema>>,
    /// `x-*` extension keywords
    #[serde(flatten)]
    pub extensions: BTreeMap<String, Value>,
}

impl Schema {
    /// A schema with only `type` set
    pub fn typed(schema_type: &str) -> Self {
        Schema {
            schema_type: Some(schema_type.to_string()),
            ..Default::default()
        }
    }

    fn formatted(schema_type: &str, format: &str) -> Self {
        Schema {
            format: Some(format.to_string()),
            ..Schema::typed(schema_type)
        }
    }

    /// `{"$ref": "#/components/schemas/<name>"}`
    pub fn reference(name: &str) -> Self {
        Schema {
            reference: Some(format!("{}{}", SCHEMA_REF_PREFIX, name)),
            ..Default::default()
        }
    }

    pub fn array(items: Schema) -> Self {
        Schema {
            items: Some(Box::new(items)),
            ..Schema::typed("array")
        }
    }

    /// The component name this schema points at, if it is a reference.
    pub fn ref_name(&self) -> Option<&str> {
        self.reference
            .as_deref()
            .and_then(|r| r.strip_prefix(SCHEMA_REF_PREFIX))
    }

    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// The referenced name, looking through a single-element `allOf` wrapper.
    pub fn target_name(&self) -> Option<&str> {
        self.ref_name().or_else(|| match self.all_of.as_deref() {
            Some([inner]) => inner.ref_name(),
            _ => None,
        })
    }
}

/// Container-level `rename_all` rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenameRule {
    Lower,
    Upper,
    Camel,
    Snake,
    Pascal,
    ScreamingSnake,
    Kebab,
    ScreamingKebab,
}

impl RenameRule {
    pub fn parse(rule: &str) -> Option<Self> {
        match rule {
            "lowercase" => Some(RenameRule::Lower),
            "UPPERCASE" => Some(RenameRule::Upper),
            "camelCase" => Some(RenameRule::Camel),
            "snake_case" => Some(RenameRule::Snake),
            "PascalCase" => Some(RenameRule::Pascal),
            "SCREAMING_SNAKE_CASE" => Some(RenameRule::ScreamingSnake),
            "kebab-case" => Some(RenameRule::Kebab),
            "SCREAMING-KEBAB-CASE" => Some(RenameRule::ScreamingKebab),
            _ => None,
        }
    }

    /// Apply the rename rule to a field or variant name.
    pub fn apply(&self, name: &str) -> String {
        match self {
            RenameRule::Lower => name.to_lowercase(),
            RenameRule::Upper => name.to_uppercase(),
            RenameRule::Camel => name.to_case(Case::Camel),
            RenameRule::Snake => name.to_case(Case::Snake),
            RenameRule::Pascal => name.to_case(Case::Pascal),
            RenameRule::ScreamingSnake => name.to_case(Case::UpperSnake),
            RenameRule::Kebab => name.to_case(Case::Kebab),
            RenameRule::ScreamingKebab => name.to_case(Case::Kebab).to_uppercase(),
        }
    }
}

/// A field after directive merging and type compilation.
///
/// Computed once per type and shared by every variant of it.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledField {
    /// Emitted property name
    pub name: String,
    /// Declared Rust field name
    pub field_name: String,
    pub ty: TypeDescriptor,
    pub schema: Schema,
    pub required: bool,
    pub directive: MetadataDirective,
}

/// Schema generator - compiles type descriptors into OpenAPI schemas
///
/// Named types are compiled once into the owned [`SchemaRegistry`] and
/// referenced everywhere else.
pub struct SchemaGenerator<'c> {
    catalog: &'c TypeCatalog,
    registry: SchemaRegistry,
    field_cache: HashMap<TypeIdentity, Vec<CompiledField>>,
}

impl<'c> SchemaGenerator<'c> {
    /// Create a new SchemaGenerator over a catalog with a fresh registry
    pub fn new(catalog: &'c TypeCatalog) -> Self {
        Self::with_registry(catalog, SchemaRegistry::new())
    }

    pub fn with_registry(catalog: &'c TypeCatalog, registry: SchemaRegistry) -> Self {
        debug!("Initializing SchemaGenerator over {} types", catalog.len());
        Self {
            catalog,
            registry,
            field_cache: HashMap::new(),
        }
    }

    pub fn catalog(&self) -> &'c TypeCatalog {
        self.catalog
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SchemaRegistry {
        &mut self.registry
    }

    pub fn into_registry(self) -> SchemaRegistry {
        self.registry
    }

    /// Compile a descriptor. Named types come back as references.
    pub fn compile(&mut self, ty: &TypeDescriptor) -> Schema {
        match ty {
            TypeDescriptor::Primitive(primitive) => primitive_schema(primitive),
            TypeDescriptor::Array(inner) => Schema::array(self.compile(inner)),
            TypeDescriptor::Map(value) => Schema {
                additional_properties: Some(Box::new(self.compile(value))),
                ..Schema::typed("object")
            },
            TypeDescriptor::Optional(inner) => self.compile(inner),
            TypeDescriptor::Object(identity) => self.compile_object(identity),
            TypeDescriptor::Opaque => Schema::default(),
            TypeDescriptor::Unresolved(name) => {
                self.registry.record(Degradation::UnsupportedKind {
                    type_name: name.clone(),
                });
                Schema::default()
            }
        }
    }

    fn compile_object(&mut self, identity: &TypeIdentity) -> Schema {
        let catalog = self.catalog;
        let Some(def) = catalog.get(identity) else {
            self.registry.record(Degradation::UnsupportedKind {
                type_name: identity.qualified(),
            });
            return Schema::default();
        };

        let key = SchemaKey::full(identity.clone());
        if self.registry.is_in_progress(&key) {
            debug!("Cycle through {}, emitting reference", identity);
        }
        let (is_new, name) = self.registry.register_or_ref(&key, &identity.name);
        if !is_new {
            return Schema::reference(&name);
        }

        debug!("Compiling schema {} for {}", name, identity);
        self.registry.mark_in_progress(&key);
        let schema = match &def.body {
            TypeBody::Struct { .. } => self.compile_object_body(identity, |_| true, true),
            TypeBody::Enum { variants } => self.enum_schema(def, variants),
        };
        self.registry.clear(&key);
        self.registry.put(&name, schema);

        Schema::reference(&name)
    }

    fn enum_schema(&mut self, def: &TypeDef, variants: &[String]) -> Schema {
        let rule = self.rename_rule(def);
        let values = variants
            .iter()
            .map(|v| rule.map_or_else(|| v.clone(), |r| r.apply(v)))
            .collect();
        Schema {
            enum_values: Some(values),
            description: def.doc.clone(),
            ..Schema::typed("string")
        }
    }

    fn rename_rule(&mut self, def: &TypeDef) -> Option<RenameRule> {
        let raw = def.rename_all.as_deref()?;
        let rule = RenameRule::parse(raw);
        if rule.is_none() {
            self.registry.record(Degradation::MalformedAnnotation {
                namespace: "serde",
                clause: format!("rename_all = \"{}\"", raw),
                reason: format!("unknown rename rule on {}", def.identity),
            });
        }
        rule
    }

    /// Object schema for a struct from its compiled fields.
    ///
    /// `include` decides which fields appear. When `with_required` is false
    /// the schema has no required set.
    pub fn compile_object_body(
        &mut self,
        identity: &TypeIdentity,
        include: impl Fn(&CompiledField) -> bool,
        with_required: bool,
    ) -> Schema {
        let mut properties = BTreeMap::new();
        let mut required = Vec::new();

        for field in self.compile_fields(identity) {
            if !include(&field) {
                continue;
            }
            if with_required && field.required {
                required.push(field.name.clone());
            }
            properties.insert(field.name, field.schema);
        }

        Schema {
            properties: Some(properties),
            required: (!required.is_empty()).then_some(required),
            description: self.catalog.get(identity).and_then(|def| def.doc.clone()),
            ..Schema::typed("object")
        }
    }

    /// Compiled fields of a struct, embedded structs hoisted, skipped and
    /// hidden fields removed.
    pub fn compile_fields(&mut self, identity: &TypeIdentity) -> Vec<CompiledField> {
        if let Some(cached) = self.field_cache.get(identity) {
            return cached.clone();
        }

        let catalog = self.catalog;
        let mut rules: HashMap<&TypeIdentity, Option<RenameRule>> = HashMap::new();
        let mut fields: Vec<CompiledField> = Vec::new();

        for flat in catalog.flattened_fields(identity) {
            let rule = match rules.get(&flat.owner.identity) {
                Some(rule) => *rule,
                None => {
                    let rule = self.rename_rule(flat.owner);
                    rules.insert(&flat.owner.identity, rule);
                    rule
                }
            };
            let Some(compiled) = self.compile_field(flat.field, rule) else {
                continue;
            };
            if fields.iter().any(|f| f.name == compiled.name) {
                warn!(
                    "Duplicate property {} in {}, keeping the first declaration",
                    compiled.name, identity
                );
                continue;
            }
            fields.push(compiled);
        }

        self.field_cache.insert(identity.clone(), fields.clone());
        fields
    }

    /// Compile one field: merge its annotations, name it, compile its type and
    /// apply the directive. Returns `None` for skipped or hidden fields.
    pub fn compile_field(
        &mut self,
        field: &FieldDeclaration,
        rename: Option<RenameRule>,
    ) -> Option<CompiledField> {
        let mut directive = merge_tags(&field.tags);
        for issue in directive.issues.drain(..) {
            self.registry.record(issue);
        }
        if directive.skip || directive.hidden {
            debug!("Skipping field {}", field.name);
            return None;
        }
        if directive.description.is_none() {
            directive.description = field.doc.clone();
        }

        let name = directive
            .name
            .clone()
            .unwrap_or_else(|| rename.map_or_else(|| field.name.clone(), |r| r.apply(&field.name)));
        let schema = apply_directive(self.compile(&field.ty), &directive);
        let required =
            directive.required || (!field.ty.is_optional() && !directive.omit_if_default);

        Some(CompiledField {
            name,
            field_name: field.name.clone(),
            ty: field.ty.clone(),
            schema,
            required,
            directive,
        })
    }
}

/// Convert a primitive to its fixed schema shape
fn primitive_schema(primitive: &Primitive) -> Schema {
    match primitive {
        Primitive::Bool => Schema::typed("boolean"),
        Primitive::Integer { bits, .. } if *bits <= 32 => Schema::formatted("integer", "int32"),
        Primitive::Integer { .. } => Schema::formatted("integer", "int64"),
        Primitive::Float { bits } if *bits <= 32 => Schema::formatted("number", "float"),
        Primitive::Float { .. } => Schema::formatted("number", "double"),
        Primitive::String => Schema::typed("string"),
        Primitive::Char => Schema {
            min_length: Some(1),
            max_length: Some(1),
            ..Schema::typed("string")
        },
        Primitive::Bytes => Schema::formatted("string", "byte"),
        Primitive::Formatted(format) => Schema::formatted("string", format.as_str()),
    }
}

/// Applies a merged directive to a compiled field schema.
///
/// Constraints only land on kinds they fit. References cannot carry sibling
/// keywords, so their annotations go on an `allOf` wrapper.
fn apply_directive(schema: Schema, d: &MetadataDirective) -> Schema {
    if schema.is_reference() {
        let mut wrapper = Schema::default();
        annotate(&mut wrapper, d, None);
        if wrapper == Schema::default() {
            return schema;
        }
        wrapper.all_of = Some(vec![schema]);
        return wrapper;
    }

    let mut schema = schema;
    let kind = schema.schema_type.clone();
    match kind.as_deref() {
        Some("integer") | Some("number") => {
            schema.minimum = d.minimum.or(schema.minimum);
            schema.maximum = d.maximum.or(schema.maximum);
            schema.exclusive_minimum = d.exclusive_minimum.or(schema.exclusive_minimum);
            schema.exclusive_maximum = d.exclusive_maximum.or(schema.exclusive_maximum);
        }
        Some("string") => {
            schema.min_length = d.min_length.or(schema.min_length);
            schema.max_length = d.max_length.or(schema.max_length);
            schema.pattern = d.pattern.clone().or(schema.pattern);
        }
        Some("array") => {
            schema.min_items = d.min_length.or(schema.min_items);
            schema.max_items = d.max_length.or(schema.max_items);
        }
        _ => {}
    }
    if let Some(format) = &d.format {
        schema.format = Some(format.clone());
    }
    if !d.enum_values.is_empty() {
        schema.enum_values = Some(d.enum_values.clone());
    }
    annotate(&mut schema, d, kind.as_deref());
    schema
}

fn annotate(schema: &mut Schema, d: &MetadataDirective, kind: Option<&str>) {
    if let Some(description) = &d.description {
        schema.description = Some(description.clone());
    }
    if d.unique {
        schema.description = Some(match schema.description.take() {
            Some(existing) => format!("{}. Must be unique", existing.trim_end_matches('.')),
            None => "Must be unique".to_string(),
        });
    }
    if let Some(default) = &d.default {
        schema.default = Some(typed_value(default, kind));
    }
    if let Some(example) = &d.example {
        schema.example = Some(typed_value(example, kind));
    }
    schema.read_only |= d.read_only;
    schema.write_only |= d.write_only;
    schema.deprecated |= d.deprecated;
}

/// Interprets an annotation value according to the schema kind it decorates.
fn typed_value(raw: &str, kind: Option<&str>) -> Value {
    let parsed = match kind {
        Some("integer") => raw.trim().parse::<i64>().ok().map(Value::from),
        Some("number") => raw
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        Some("boolean") => raw.trim().parse::<bool>().ok().map(Value::Bool),
        Some("string") => None,
        _ => serde_json::from_str::<Value>(raw).ok(),
    };
    parsed.unwrap_or_else(|| Value::String(raw.to_string()))
}
