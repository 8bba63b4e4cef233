use crate::descriptor::{
    FieldDeclaration, FieldTags, Primitive, StringFormat, TypeCatalog, TypeDef, TypeDescriptor,
    TypeIdentity,
};
use crate::metadata::{self, Namespace};
use crate::parser::ParsedFile;
use crate::schema_generator::RenameRule;
use log::{debug, warn};
use std::collections::BTreeMap;

/// Alias chains longer than this are treated as opaque
const MAX_ALIAS_DEPTH: usize = 16;

/// Type resolver - builds the type catalog from parsed sources
///
/// Every struct and unit-only enum becomes a [`TypeDef`]. Newtype structs,
/// `#[serde(transparent)]` structs and `type` aliases are followed to their
/// target; enums with data and other shapes without a fixed schema are
/// opaque.
pub struct TypeResolver {
    catalog: TypeCatalog,
}

/// What a name in scope refers to.
enum Found<'a> {
    Named(TypeIdentity),
    Alias { target: &'a syn::Type, module: String },
    Opaque,
}

/// Name resolution for type paths.
trait Scope {
    fn lookup(&self, segments: &[String], from_module: &str) -> Option<Found<'_>>;
}

/// A declaration collected in the first pass.
enum Declared {
    Struct {
        item: syn::ItemStruct,
        generics: Vec<String>,
    },
    Enum {
        item: syn::ItemEnum,
    },
    Alias {
        target: syn::Type,
    },
    Opaque,
}

#[derive(Default)]
struct Index {
    entries: BTreeMap<TypeIdentity, Declared>,
}

impl Scope for Index {
    fn lookup(&self, segments: &[String], from_module: &str) -> Option<Found<'_>> {
        let identity = pick(self.entries.keys(), segments, from_module)?;
        let found = match self.entries.get(identity)? {
            Declared::Struct { .. } | Declared::Enum { .. } => Found::Named(identity.clone()),
            Declared::Alias { target } => Found::Alias {
                target,
                module: identity.module.clone(),
            },
            Declared::Opaque => Found::Opaque,
        };
        Some(found)
    }
}

impl Scope for TypeCatalog {
    fn lookup(&self, segments: &[String], from_module: &str) -> Option<Found<'_>> {
        self.find_from(&segments.join("::"), from_module)
            .map(|def| Found::Named(def.identity.clone()))
    }
}

/// Picks the identity a path refers to when seen from `from_module`.
///
/// `crate::`, `self::` and `super::` prefixes are absolute or relative to
/// `from_module`; any other prefix matches the tail of a module path. A bare
/// name prefers `from_module`, then the first match in identity order.
fn pick<'a>(
    identities: impl Iterator<Item = &'a TypeIdentity>,
    segments: &[String],
    from_module: &str,
) -> Option<&'a TypeIdentity> {
    let (name, prefix) = segments.split_last()?;
    let module: Option<String> = match prefix.first().map(String::as_str) {
        None => None,
        Some("crate") => Some(
            std::iter::once("crate")
                .chain(prefix[1..].iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join("::"),
        ),
        Some("self") => Some(join_module(from_module, &prefix[1..])),
        Some("super") => {
            let parent = from_module.rsplit_once("::").map_or("crate", |(p, _)| p);
            Some(join_module(parent, &prefix[1..]))
        }
        Some(_) => {
            let tail = prefix.join("::");
            let suffix = format!("::{}", tail);
            return identities
                .filter(|id| &id.name == name)
                .find(|id| id.module == tail || id.module.ends_with(&suffix));
        }
    };

    let candidates: Vec<&TypeIdentity> = identities.filter(|id| &id.name == name).collect();
    match module {
        Some(module) => candidates.into_iter().find(|id| id.module == module),
        None => {
            if let Some(local) = candidates.iter().find(|id| id.module == from_module) {
                return Some(*local);
            }
            if candidates.len() > 1 {
                debug!(
                    "{} is ambiguous from {}, using {}",
                    name, from_module, candidates[0]
                );
            }
            candidates.first().copied()
        }
    }
}

fn join_module(base: &str, rest: &[String]) -> String {
    std::iter::once(base)
        .chain(rest.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join("::")
}

impl TypeResolver {
    /// Create a new TypeResolver and build the catalog from parsed files
    pub fn new(parsed_files: Vec<ParsedFile>) -> Self {
        debug!("Initializing TypeResolver with {} files", parsed_files.len());

        let mut index = Index::default();
        for parsed in &parsed_files {
            collect_items(&parsed.syntax_tree.items, &parsed.module_path, &mut index);
        }

        let mut catalog = TypeCatalog::new();
        for (identity, declared) in &index.entries {
            match declared {
                Declared::Struct { item, generics } => {
                    catalog.insert(struct_def(identity, item, generics, &index))
                }
                Declared::Enum { item } => catalog.insert(enum_def(identity, item)),
                Declared::Alias { .. } | Declared::Opaque => {}
            }
        }
        debug!("Catalog holds {} types", catalog.len());

        Self { catalog }
    }

    pub fn catalog(&self) -> &TypeCatalog {
        &self.catalog
    }

    pub fn into_catalog(self) -> TypeCatalog {
        self.catalog
    }
}

/// Resolves a Rust type expression such as `Vec<User>` or
/// `Option<billing::Item>` against a catalog.
///
/// Expressions that do not parse as a Rust type come back unresolved.
pub fn resolve_type_expr(catalog: &TypeCatalog, expr: &str) -> TypeDescriptor {
    match syn::parse_str::<syn::Type>(expr) {
        Ok(ty) => descriptor_of(&ty, "crate", &[], catalog, 0),
        Err(e) => {
            warn!("Cannot parse type expression `{}`: {}", expr, e);
            TypeDescriptor::Unresolved(expr.to_string())
        }
    }
}

/// First pass: record every named type, walking inline modules.
fn collect_items(items: &[syn::Item], module: &str, index: &mut Index) {
    for item in items {
        match item {
            syn::Item::Struct(item_struct) => {
                let identity = TypeIdentity::new(module, item_struct.ident.to_string());
                let declared = match &item_struct.fields {
                    syn::Fields::Named(_) if !is_transparent(&item_struct.attrs) => {
                        Declared::Struct {
                            item: item_struct.clone(),
                            generics: generic_names(&item_struct.generics),
                        }
                    }
                    // Newtypes and transparent wrappers serialize as their only field
                    fields if fields.len() == 1 => match fields.iter().next() {
                        Some(field) => Declared::Alias {
                            target: field.ty.clone(),
                        },
                        None => Declared::Opaque,
                    },
                    _ => Declared::Opaque,
                };
                index.entries.insert(identity, declared);
            }
            syn::Item::Enum(item_enum) => {
                let identity = TypeIdentity::new(module, item_enum.ident.to_string());
                let unit_only = item_enum
                    .variants
                    .iter()
                    .all(|v| matches!(v.fields, syn::Fields::Unit));
                let declared = if unit_only {
                    Declared::Enum {
                        item: item_enum.clone(),
                    }
                } else {
                    debug!("Enum {} carries data, treating it as opaque", identity);
                    Declared::Opaque
                };
                index.entries.insert(identity, declared);
            }
            syn::Item::Type(item_type) => {
                let identity = TypeIdentity::new(module, item_type.ident.to_string());
                index.entries.insert(
                    identity,
                    Declared::Alias {
                        target: (*item_type.ty).clone(),
                    },
                );
            }
            syn::Item::Mod(item_mod) => {
                if let Some((_, items)) = &item_mod.content {
                    let inner = format!("{}::{}", module, item_mod.ident);
                    collect_items(items, &inner, index);
                }
            }
            _ => {}
        }
    }
}

fn generic_names(generics: &syn::Generics) -> Vec<String> {
    generics
        .type_params()
        .map(|param| param.ident.to_string())
        .collect()
}

fn struct_def(
    identity: &TypeIdentity,
    item: &syn::ItemStruct,
    generics: &[String],
    index: &Index,
) -> TypeDef {
    let fields = item
        .fields
        .iter()
        .filter_map(|field| {
            let name = field.ident.as_ref()?.to_string();
            let name = name.strip_prefix("r#").map(str::to_string).unwrap_or(name);
            let ty = descriptor_of(&field.ty, &identity.module, generics, index, 0);
            let tags = field_tags(&field.attrs);
            let embedded = metadata::parse(Namespace::Serialization, &tags.serialization).flatten;

            let mut declaration = FieldDeclaration::new(name, ty).with_tags(tags);
            declaration.embedded = embedded;
            declaration.doc = doc_comment(&field.attrs);
            Some(declaration)
        })
        .collect::<Vec<_>>();

    debug!("Resolved struct {} with {} fields", identity, fields.len());
    let mut def = TypeDef::structure(identity.clone(), fields);
    def.rename_all = container_rename_all(&item.attrs);
    def.doc = doc_comment(&item.attrs);
    def
}

fn enum_def(identity: &TypeIdentity, item: &syn::ItemEnum) -> TypeDef {
    let rename_all = container_rename_all(&item.attrs);
    let mut explicit = false;
    let mut variants = Vec::new();

    for variant in &item.variants {
        let tags = metadata::parse(Namespace::Serialization, &namespace_tokens(&variant.attrs, "serde", ", "));
        if tags.skip {
            continue;
        }
        explicit |= tags.name.is_some();
        variants.push((variant.ident.to_string(), tags.name));
    }

    let mut def = if explicit {
        // Per-variant renames are final, so the container rule is applied here
        let rule = rename_all.as_deref().and_then(RenameRule::parse);
        let names = variants
            .into_iter()
            .map(|(ident, renamed)| {
                renamed.unwrap_or_else(|| rule.map_or_else(|| ident.clone(), |r| r.apply(&ident)))
            })
            .collect();
        TypeDef::enumeration(identity.clone(), names)
    } else {
        let names = variants.into_iter().map(|(ident, _)| ident).collect();
        let mut def = TypeDef::enumeration(identity.clone(), names);
        def.rename_all = rename_all;
        def
    };
    def.doc = doc_comment(&item.attrs);
    def
}

/// Raw tokens of every `#[<name>(...)]` attribute, joined.
fn namespace_tokens(attrs: &[syn::Attribute], name: &str, separator: &str) -> String {
    attrs
        .iter()
        .filter(|attr| attr.path().is_ident(name))
        .filter_map(|attr| attr.meta.require_list().ok())
        .map(|list| list.tokens.to_string())
        .filter(|tokens| !tokens.trim().is_empty())
        .collect::<Vec<_>>()
        .join(separator)
}

fn field_tags(attrs: &[syn::Attribute]) -> FieldTags {
    FieldTags {
        serialization: namespace_tokens(attrs, "serde", ", "),
        validation: namespace_tokens(attrs, "validate", ", "),
        persistence: namespace_tokens(attrs, "db", "; "),
        docs: namespace_tokens(attrs, "docs", ", "),
    }
}

/// Reads `#[serde(rename_all = "...")]` from a container.
fn container_rename_all(attrs: &[syn::Attribute]) -> Option<String> {
    let mut rename_all = None;
    for attr in attrs.iter().filter(|a| a.path().is_ident("serde")) {
        let result = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("rename_all") {
                if meta.input.peek(syn::Token![=]) {
                    let rule: syn::LitStr = meta.value()?.parse()?;
                    rename_all = Some(rule.value());
                } else {
                    // rename_all(serialize = "..", deserialize = "..")
                    meta.parse_nested_meta(|inner| {
                        let rule: syn::LitStr = inner.value()?.parse()?;
                        if inner.path.is_ident("serialize") {
                            rename_all = Some(rule.value());
                        }
                        Ok(())
                    })?;
                }
            } else if meta.input.peek(syn::Token![=]) {
                let _: syn::Expr = meta.value()?.parse()?;
            } else if meta.input.peek(syn::token::Paren) {
                let _content;
                syn::parenthesized!(_content in meta.input);
            }
            Ok(())
        });
        if let Err(e) = result {
            debug!("Ignoring unreadable serde container attribute: {}", e);
        }
    }
    rename_all
}

fn is_transparent(attrs: &[syn::Attribute]) -> bool {
    namespace_tokens(attrs, "serde", ", ")
        .split(',')
        .any(|clause| clause.trim() == "transparent")
}

/// Joined `///` lines, if any.
fn doc_comment(attrs: &[syn::Attribute]) -> Option<String> {
    let lines: Vec<String> = attrs
        .iter()
        .filter(|attr| attr.path().is_ident("doc"))
        .filter_map(|attr| match &attr.meta {
            syn::Meta::NameValue(nv) => match &nv.value {
                syn::Expr::Lit(syn::ExprLit {
                    lit: syn::Lit::Str(s),
                    ..
                }) => Some(s.value().trim().to_string()),
                _ => None,
            },
            _ => None,
        })
        .filter(|line| !line.is_empty())
        .collect();
    (!lines.is_empty()).then(|| lines.join(" "))
}

/// The type arguments of a path segment, lifetimes and consts dropped.
fn type_args(segment: &syn::PathSegment) -> Vec<&syn::Type> {
    match &segment.arguments {
        syn::PathArguments::AngleBracketed(args) => args
            .args
            .iter()
            .filter_map(|arg| match arg {
                syn::GenericArgument::Type(ty) => Some(ty),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn is_u8(ty: &syn::Type) -> bool {
    matches!(ty, syn::Type::Path(tp) if tp.path.is_ident("u8"))
}

fn primitive_named(name: &str) -> Option<Primitive> {
    let integer = |bits, signed| Some(Primitive::Integer { bits, signed });
    match name {
        "String" | "str" | "PathBuf" | "OsString" => Some(Primitive::String),
        "bool" => Some(Primitive::Bool),
        "char" => Some(Primitive::Char),
        "i8" => integer(8, true),
        "i16" => integer(16, true),
        "i32" => integer(32, true),
        "i64" | "isize" => integer(64, true),
        "i128" => integer(128, true),
        "u8" => integer(8, false),
        "u16" => integer(16, false),
        "u32" => integer(32, false),
        "u64" | "usize" => integer(64, false),
        "u128" => integer(128, false),
        "f32" => Some(Primitive::Float { bits: 32 }),
        "f64" => Some(Primitive::Float { bits: 64 }),
        "Bytes" | "ByteBuf" => Some(Primitive::Bytes),
        _ => None,
    }
    .or_else(|| well_known(name).map(Primitive::Formatted))
}

/// Value types from the common ecosystem crates that serialize as strings.
fn well_known(name: &str) -> Option<StringFormat> {
    match name {
        "DateTime" | "NaiveDateTime" | "OffsetDateTime" | "PrimitiveDateTime" | "SystemTime"
        | "Timestamp" => Some(StringFormat::DateTime),
        "NaiveDate" | "Date" => Some(StringFormat::Date),
        "NaiveTime" | "Time" => Some(StringFormat::Time),
        "Duration" => Some(StringFormat::Duration),
        "Uuid" => Some(StringFormat::Uuid),
        "Url" | "Uri" => Some(StringFormat::Uri),
        "IpAddr" => Some(StringFormat::Ip),
        "Ipv4Addr" => Some(StringFormat::Ipv4),
        "Ipv6Addr" => Some(StringFormat::Ipv6),
        "Decimal" | "BigDecimal" => Some(StringFormat::Decimal),
        _ => None,
    }
}

/// Converts a `syn` type into a descriptor, resolving names through `scope`.
fn descriptor_of(
    ty: &syn::Type,
    module: &str,
    generics: &[String],
    scope: &dyn Scope,
    depth: usize,
) -> TypeDescriptor {
    if depth > MAX_ALIAS_DEPTH {
        warn!("Alias chain too deep in {}, treating as opaque", module);
        return TypeDescriptor::Opaque;
    }
    let recurse = |inner: &syn::Type| descriptor_of(inner, module, generics, scope, depth);

    match ty {
        syn::Type::Path(type_path) if type_path.qself.is_none() => {
            let path = &type_path.path;
            let Some(last) = path.segments.last() else {
                return TypeDescriptor::Opaque;
            };
            let name = last.ident.to_string();
            let args = type_args(last);

            if path.segments.len() == 1 && generics.contains(&name) {
                return TypeDescriptor::Opaque;
            }

            match (name.as_str(), args.as_slice()) {
                ("Option", [inner]) => TypeDescriptor::optional(recurse(inner)),
                ("Vec", [inner]) if is_u8(inner) => TypeDescriptor::Primitive(Primitive::Bytes),
                ("Vec" | "VecDeque" | "LinkedList" | "HashSet" | "BTreeSet" | "IndexSet", [inner]) => {
                    TypeDescriptor::array(recurse(inner))
                }
                ("HashMap" | "BTreeMap" | "IndexMap", [_, value, ..]) => {
                    TypeDescriptor::map(recurse(value))
                }
                ("Box" | "Rc" | "Arc" | "Cow" | "RefCell" | "Cell" | "Mutex" | "RwLock", [inner, ..]) => {
                    recurse(inner)
                }
                ("Value", _) => TypeDescriptor::Opaque,
                _ => {
                    if let Some(primitive) = primitive_named(&name) {
                        return TypeDescriptor::Primitive(primitive);
                    }
                    let segments: Vec<String> =
                        path.segments.iter().map(|s| s.ident.to_string()).collect();
                    match scope.lookup(&segments, module) {
                        Some(Found::Named(identity)) => TypeDescriptor::Object(identity),
                        Some(Found::Alias { target, module }) => {
                            descriptor_of(target, &module, &[], scope, depth + 1)
                        }
                        Some(Found::Opaque) => TypeDescriptor::Opaque,
                        None => {
                            debug!("No definition for {} from {}", segments.join("::"), module);
                            TypeDescriptor::Unresolved(segments.join("::"))
                        }
                    }
                }
            }
        }
        syn::Type::Reference(reference) => recurse(&reference.elem),
        syn::Type::Paren(paren) => recurse(&paren.elem),
        syn::Type::Group(group) => recurse(&group.elem),
        syn::Type::Slice(slice) if is_u8(&slice.elem) => TypeDescriptor::Primitive(Primitive::Bytes),
        syn::Type::Slice(slice) => TypeDescriptor::array(recurse(&slice.elem)),
        syn::Type::Array(array) if is_u8(&array.elem) => TypeDescriptor::Primitive(Primitive::Bytes),
        syn::Type::Array(array) => TypeDescriptor::array(recurse(&array.elem)),
        _ => TypeDescriptor::Opaque,
    }
}
