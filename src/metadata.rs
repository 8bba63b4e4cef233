//! Field annotation parsing.
//!
//! Each field carries raw attribute text for four namespaces:
//!
//! | Namespace | Attribute | Example |
//! |---|---|---|
//! | serialization | `#[serde(...)]` | `rename = "user_name", skip_serializing_if = "Option::is_none"` |
//! | validation | `#[validate(...)]` | `required, email, length(min = 1, max = 100)` |
//! | persistence | `#[db(...)]` | `primary_key; size: 255; default: "active"` |
//! | documentation | `#[docs(...)]` | `description = "Display name", example = "Ada"` |
//!
//! [`parse`] turns one namespace into a [`MetadataDirective`] and [`merge`]
//! combines the four with a fixed precedence. Parsing never fails: clauses
//! that cannot be understood are dropped and reported through
//! [`MetadataDirective::issues`].

use crate::descriptor::FieldTags;
use crate::error::Degradation;
use log::warn;

/// The annotation namespace a raw string came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Namespace {
    Serialization,
    Validation,
    Persistence,
    Docs,
}

impl Namespace {
    /// Attribute name the namespace is read from
    pub fn label(&self) -> &'static str {
        match self {
            Namespace::Serialization => "serde",
            Namespace::Validation => "validate",
            Namespace::Persistence => "db",
            Namespace::Docs => "docs",
        }
    }

    fn delimiters(&self) -> &'static [char] {
        match self {
            Namespace::Persistence => &[';', ','],
            _ => &[','],
        }
    }

    fn separators(&self) -> &'static [char] {
        match self {
            Namespace::Persistence | Namespace::Docs => &[':', '='],
            _ => &['='],
        }
    }
}

/// Normalized per-field metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataDirective {
    /// Emitted property name (`rename`)
    pub name: Option<String>,
    pub omit_if_default: bool,
    pub skip: bool,
    pub flatten: bool,
    pub required: bool,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
    pub exclusive_minimum: Option<f64>,
    pub exclusive_maximum: Option<f64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub enum_values: Vec<String>,
    pub format: Option<String>,
    pub pattern: Option<String>,
    pub default: Option<String>,
    pub example: Option<String>,
    pub description: Option<String>,
    pub deprecated: bool,
    pub hidden: bool,
    pub read_only: bool,
    pub write_only: bool,
    pub unique: bool,
    /// Primary key or auto-increment column
    pub identity_key: bool,
    /// Timestamp assigned by the storage layer
    pub auto_timestamp: bool,
    pub foreign_key: Option<String>,
    /// Join table of a many-to-many association
    pub join_table: Option<String>,
    /// Clauses dropped while parsing
    pub issues: Vec<Degradation>,
}

impl MetadataDirective {
    /// Whether the field is assigned by the server rather than the client.
    pub fn is_server_assigned(&self) -> bool {
        self.identity_key || self.auto_timestamp || self.read_only
    }

    fn drop_clause(&mut self, namespace: Namespace, clause: &str, reason: impl Into<String>) {
        let issue = Degradation::MalformedAnnotation {
            namespace: namespace.label(),
            clause: clause.to_string(),
            reason: reason.into(),
        };
        warn!("{}", issue);
        self.issues.push(issue);
    }
}

/// One `key`, `key = value` or `key(args)` item of an annotation.
#[derive(Debug, Clone, PartialEq)]
struct Clause<'a> {
    raw: &'a str,
    key: String,
    value: Option<String>,
    args: Option<&'a str>,
}

/// Splits on delimiters that are outside quotes and parentheses.
fn split_top_level<'a>(raw: &'a str, delimiters: &[char]) -> Vec<&'a str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (i, c) in raw.char_indices() {
        if let Some(q) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' | '[' => depth += 1,
            // A stray closer must not hide the delimiters after it
            ')' | ']' => depth = (depth - 1).max(0),
            _ if depth == 0 && delimiters.contains(&c) => {
                parts.push(&raw[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);

    parts.into_iter().map(str::trim).filter(|p| !p.is_empty()).collect()
}

/// Position of the first separator outside quotes and parentheses.
fn find_top_level(raw: &str, separators: &[char]) -> Option<usize> {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    for (i, c) in raw.char_indices() {
        if let Some(q) = quote {
            if c == q {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' => quote = Some(c),
            '(' => depth += 1,
            ')' => depth = (depth - 1).max(0),
            _ if depth == 0 && separators.contains(&c) => return Some(i),
            _ => {}
        }
    }
    None
}

/// Strips one layer of matching quotes and undoes `\"` and `\\` escapes.
fn unquote(value: &str) -> String {
    let value = value.trim();
    let inner = ['"', '\'']
        .iter()
        .find_map(|q| value.strip_prefix(*q).and_then(|v| v.strip_suffix(*q)))
        .unwrap_or(value);
    inner.replace("\\\"", "\"").replace("\\\\", "\\")
}

fn is_key(key: &str) -> bool {
    key == "-"
        || (!key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ' '))
}

fn lex_clause<'a>(raw: &'a str, separators: &[char]) -> Result<Clause<'a>, String> {
    let paren = raw.find('(');
    let sep = find_top_level(raw, separators);

    if let Some(open) = paren.filter(|open| sep.map_or(true, |s| *open < s)) {
        let key = raw[..open].trim();
        let rest = raw[open + 1..].trim_end();
        let args = rest
            .strip_suffix(')')
            .ok_or_else(|| "unbalanced parentheses".to_string())?;
        if !is_key(key) {
            return Err(format!("invalid key `{}`", key));
        }
        return Ok(Clause {
            raw,
            key: key.to_string(),
            value: None,
            args: Some(args.trim()),
        });
    }

    let (key, value) = match sep {
        Some(i) => (raw[..i].trim(), Some(unquote(&raw[i + 1..]))),
        None => (raw.trim(), None),
    };
    if !is_key(key) {
        return Err(format!("invalid key `{}`", key));
    }
    Ok(Clause {
        raw,
        key: key.to_string(),
        value,
        args: None,
    })
}

/// Lexes every clause of `raw`, reporting the ones that do not lex.
fn clauses<'a>(
    namespace: Namespace,
    raw: &'a str,
    directive: &mut MetadataDirective,
) -> Vec<Clause<'a>> {
    let mut out = Vec::new();
    for part in split_top_level(raw, namespace.delimiters()) {
        match lex_clause(part, namespace.separators()) {
            Ok(clause) => out.push(clause),
            Err(reason) => directive.drop_clause(namespace, part, reason),
        }
    }
    out
}

/// `key = value` pairs inside a parenthesized argument list.
fn arguments(args: &str) -> Vec<(String, Option<String>)> {
    split_top_level(args, &[','])
        .into_iter()
        .map(|part| match find_top_level(part, &['=']) {
            Some(i) => (part[..i].trim().to_string(), Some(unquote(&part[i + 1..]))),
            None => (part.trim().to_string(), None),
        })
        .collect()
}

fn parse_number(value: &str) -> Option<f64> {
    let compact: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    compact.parse::<f64>().ok().filter(|v| v.is_finite())
}

fn parse_length(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

/// Parses one namespace's raw annotation text.
pub fn parse(namespace: Namespace, raw: &str) -> MetadataDirective {
    let mut directive = MetadataDirective::default();
    let raw = raw.trim();
    if raw.is_empty() {
        return directive;
    }
    match namespace {
        Namespace::Serialization => parse_serialization(raw, &mut directive),
        Namespace::Validation => parse_validation(raw, &mut directive),
        Namespace::Persistence => parse_persistence(raw, &mut directive),
        Namespace::Docs => parse_docs(raw, &mut directive),
    }
    directive
}

fn parse_serialization(raw: &str, d: &mut MetadataDirective) {
    let ns = Namespace::Serialization;
    for clause in clauses(ns, raw, d) {
        match clause.key.as_str() {
            "rename" => {
                if let Some(value) = clause.value.filter(|v| !v.is_empty()) {
                    d.name = Some(value);
                } else if let Some(args) = clause.args {
                    // rename(serialize = "..", deserialize = "..")
                    let pairs = arguments(args);
                    let pick = |key: &str| {
                        pairs
                            .iter()
                            .find(|(k, _)| k == key)
                            .and_then(|(_, v)| v.clone())
                    };
                    match pick("serialize").or_else(|| pick("deserialize")) {
                        Some(name) => d.name = Some(name),
                        None => d.drop_clause(ns, clause.raw, "rename without a name"),
                    }
                } else {
                    d.drop_clause(ns, clause.raw, "rename without a name");
                }
            }
            "skip" | "skip_serializing" => d.skip = true,
            // Still serialized, so documented, but never accepted as input
            "skip_deserializing" => d.read_only = true,
            "skip_serializing_if" | "default" => d.omit_if_default = true,
            "flatten" => d.flatten = true,
            _ => {}
        }
    }
}

fn parse_validation(raw: &str, d: &mut MetadataDirective) {
    let ns = Namespace::Validation;
    for clause in clauses(ns, raw, d) {
        match clause.key.as_str() {
            "required" => d.required = true,
            "skip" => d.skip = true,
            "email" => d.format = Some("email".into()),
            "url" | "uri" => d.format = Some("uri".into()),
            "uuid" => d.format = Some("uuid".into()),
            "ip" | "ipv4" => d.format = Some("ipv4".into()),
            "ipv6" => d.format = Some("ipv6".into()),
            "datetime" => d.format = Some("date-time".into()),
            "length" => match clause.args {
                Some(args) => {
                    for (key, value) in arguments(args) {
                        let parsed = value.as_deref().and_then(parse_length);
                        match (key.as_str(), parsed) {
                            ("min", Some(v)) => d.min_length = Some(v),
                            ("max", Some(v)) => d.max_length = Some(v),
                            ("equal", Some(v)) => {
                                d.min_length = Some(v);
                                d.max_length = Some(v);
                            }
                            _ => d.drop_clause(
                                ns,
                                clause.raw,
                                format!("unusable length bound `{}`", key),
                            ),
                        }
                    }
                }
                None => d.drop_clause(ns, clause.raw, "length needs arguments"),
            },
            "range" => match clause.args {
                Some(args) => {
                    for (key, value) in arguments(args) {
                        let parsed = value.as_deref().and_then(parse_number);
                        match (key.as_str(), parsed) {
                            ("min", Some(v)) => d.minimum = Some(v),
                            ("max", Some(v)) => d.maximum = Some(v),
                            ("exclusive_min", Some(v)) => d.exclusive_minimum = Some(v),
                            ("exclusive_max", Some(v)) => d.exclusive_maximum = Some(v),
                            _ => d.drop_clause(
                                ns,
                                clause.raw,
                                format!("unusable range bound `{}`", key),
                            ),
                        }
                    }
                }
                None => d.drop_clause(ns, clause.raw, "range needs arguments"),
            },
            // Shorthand bounds apply to whichever of length or value fits the field
            "min" | "max" | "gte" | "lte" | "gt" | "lt" => {
                let Some(v) = clause.value.as_deref().and_then(parse_number) else {
                    d.drop_clause(ns, clause.raw, "bound is not a number");
                    continue;
                };
                let length = (v >= 0.0 && v.fract() == 0.0).then_some(v as u64);
                match clause.key.as_str() {
                    "min" => {
                        d.minimum = Some(v);
                        d.min_length = length.or(d.min_length);
                    }
                    "max" => {
                        d.maximum = Some(v);
                        d.max_length = length.or(d.max_length);
                    }
                    "gte" => d.minimum = Some(v),
                    "lte" => d.maximum = Some(v),
                    "gt" => d.exclusive_minimum = Some(v),
                    _ => d.exclusive_maximum = Some(v),
                }
            }
            "one_of" => {
                let values: Vec<String> = match (&clause.value, clause.args) {
                    (Some(list), _) => list.split_whitespace().map(str::to_string).collect(),
                    (None, Some(args)) => split_top_level(args, &[','])
                        .into_iter()
                        .map(unquote)
                        .filter(|v| !v.is_empty())
                        .collect(),
                    (None, None) => Vec::new(),
                };
                if values.is_empty() {
                    d.drop_clause(ns, clause.raw, "empty enum list");
                } else {
                    d.enum_values = values;
                }
            }
            "pattern" | "regex" => {
                let inline = clause.args.map(arguments).unwrap_or_default();
                let pattern = match clause.key.as_str() {
                    "pattern" => clause.value.clone(),
                    _ => None,
                }
                .or_else(|| {
                    inline
                        .iter()
                        .find(|(k, _)| k == "pattern")
                        .and_then(|(_, v)| v.clone())
                });
                match pattern.filter(|p| !p.is_empty()) {
                    Some(p) => d.pattern = Some(p),
                    // `regex = "NAME"` and `regex(path = NAME)` name a static Regex
                    None if clause.key == "regex" => {
                        d.drop_clause(ns, clause.raw, "pattern is defined by a static, not inline")
                    }
                    None => d.drop_clause(ns, clause.raw, "pattern without an expression"),
                }
            }
            _ => {}
        }
    }
}

fn parse_persistence(raw: &str, d: &mut MetadataDirective) {
    let ns = Namespace::Persistence;
    for clause in clauses(ns, raw, d) {
        let key = clause.key.to_ascii_lowercase().replace(['_', ' '], "");
        match key.as_str() {
            "-" | "skip" => d.skip = true,
            "primarykey" | "autoincrement" => d.identity_key = true,
            "autocreatetime" | "autoupdatetime" => d.auto_timestamp = true,
            "unique" | "uniqueindex" => d.unique = true,
            "size" => match clause.value.as_deref().and_then(parse_length) {
                Some(size) => d.max_length = Some(size),
                None => d.drop_clause(ns, clause.raw, "size is not a non-negative integer"),
            },
            "default" => match clause.value {
                Some(value) => d.default = Some(value),
                None => d.drop_clause(ns, clause.raw, "default without a value"),
            },
            "foreignkey" => match clause.value.filter(|v| !v.is_empty()) {
                Some(column) => d.foreign_key = Some(column),
                None => d.drop_clause(ns, clause.raw, "foreign_key without a column"),
            },
            "manytomany" | "many2many" => match clause.value.filter(|v| !v.is_empty()) {
                Some(table) => d.join_table = Some(table),
                None => d.drop_clause(ns, clause.raw, "many_to_many without a join table"),
            },
            _ => {}
        }
    }
}

fn parse_docs(raw: &str, d: &mut MetadataDirective) {
    let ns = Namespace::Docs;
    for clause in clauses(ns, raw, d) {
        match clause.key.as_str() {
            "deprecated" => d.deprecated = true,
            "hidden" => d.hidden = true,
            "read_only" | "readonly" => d.read_only = true,
            "write_only" | "writeonly" => d.write_only = true,
            "description" | "example" | "format" => {
                let Some(value) = clause.value.filter(|v| !v.is_empty()) else {
                    d.drop_clause(ns, clause.raw, format!("{} without a value", clause.key));
                    continue;
                };
                match clause.key.as_str() {
                    "description" => d.description = Some(value),
                    "example" => d.example = Some(value),
                    _ => d.format = Some(value),
                }
            }
            "enum" => {
                let values: Vec<String> = clause
                    .value
                    .as_deref()
                    .unwrap_or_default()
                    .split('|')
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
                    .collect();
                if values.is_empty() {
                    d.drop_clause(ns, clause.raw, "empty enum list");
                } else {
                    d.enum_values = values;
                }
            }
            _ => {}
        }
    }
}

/// Combines the four parsed namespaces into one directive.
///
/// Validation sets required, bounds, format, enum and pattern. Persistence
/// fills what validation left unset; when both give a maximum length the
/// smaller one is kept. The documentation override is applied last and wins
/// for everything it supplies.
pub fn merge(
    serialization: MetadataDirective,
    validation: MetadataDirective,
    persistence: MetadataDirective,
    docs: MetadataDirective,
) -> MetadataDirective {
    let max_length = match (validation.max_length, persistence.max_length) {
        (Some(v), Some(p)) => Some(v.min(p)),
        (v, p) => v.or(p),
    };

    let mut issues = serialization.issues;
    issues.extend(validation.issues);
    issues.extend(persistence.issues);
    issues.extend(docs.issues);

    let identity_key = persistence.identity_key;
    let auto_timestamp = persistence.auto_timestamp;

    MetadataDirective {
        name: serialization.name,
        omit_if_default: serialization.omit_if_default,
        flatten: serialization.flatten,
        skip: serialization.skip || validation.skip || persistence.skip,
        required: validation.required,
        minimum: validation.minimum,
        maximum: validation.maximum,
        exclusive_minimum: validation.exclusive_minimum,
        exclusive_maximum: validation.exclusive_maximum,
        min_length: validation.min_length,
        max_length,
        enum_values: if docs.enum_values.is_empty() {
            validation.enum_values
        } else {
            docs.enum_values
        },
        format: docs.format.or(validation.format),
        pattern: validation.pattern,
        default: persistence.default,
        example: docs.example,
        description: docs.description,
        deprecated: docs.deprecated,
        hidden: docs.hidden,
        read_only: docs.read_only || serialization.read_only || identity_key || auto_timestamp,
        write_only: docs.write_only,
        unique: persistence.unique,
        identity_key,
        auto_timestamp,
        foreign_key: persistence.foreign_key,
        join_table: persistence.join_table,
        issues,
    }
}

/// Parses and merges every namespace of a field.
pub fn merge_tags(tags: &FieldTags) -> MetadataDirective {
    merge(
        parse(Namespace::Serialization, &tags.serialization),
        parse(Namespace::Validation, &tags.validation),
        parse(Namespace::Persistence, &tags.persistence),
        parse(Namespace::Docs, &tags.docs),
    )
}
