use crate::descriptor::TypeIdentity;
use crate::error::Degradation;
use crate::schema_generator::Schema;
use crate::variants::VariantKind;
use log::{debug, warn};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Registry key: a type identity plus the view of it being compiled.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaKey {
    pub identity: TypeIdentity,
    pub variant: VariantKind,
}

impl SchemaKey {
    pub fn new(identity: TypeIdentity, variant: VariantKind) -> Self {
        Self { identity, variant }
    }

    pub fn full(identity: TypeIdentity) -> Self {
        Self::new(identity, VariantKind::Full)
    }
}

/// Named schemas produced by one assembly pass.
///
/// Owns the key → name mapping, the name → schema table and the set of keys
/// currently being compiled. A registry is never shared while it is being
/// filled; finished builds are published by [`crate::engine`].
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    names: HashMap<SchemaKey, String>,
    taken: HashSet<String>,
    schemas: BTreeMap<String, Schema>,
    in_progress: HashSet<SchemaKey>,
    degradations: Vec<Degradation>,
}

impl SchemaRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `(false, name)` when `key` already has a name, otherwise
    /// reserves a name derived from `name_hint` and returns `(true, name)`.
    ///
    /// The first key asking for a bare name gets it. Later keys are qualified
    /// with the last segment of their module (`billing.Item`), then suffixed
    /// with a counter if that is taken too.
    pub fn register_or_ref(&mut self, key: &SchemaKey, name_hint: &str) -> (bool, String) {
        if let Some(name) = self.names.get(key) {
            return (false, name.clone());
        }

        let name = if self.taken.contains(name_hint) {
            let assigned = self.disambiguate(&key.identity, name_hint);
            self.record(Degradation::NameCollision {
                requested: name_hint.to_string(),
                assigned: assigned.clone(),
            });
            assigned
        } else {
            name_hint.to_string()
        };

        debug!("Registered {:?} of {} as {}", key.variant, key.identity, name);
        self.taken.insert(name.clone());
        self.names.insert(key.clone(), name.clone());
        (true, name)
    }

    fn disambiguate(&self, identity: &TypeIdentity, name_hint: &str) -> String {
        let base = if name_hint.contains('.') {
            name_hint.to_string()
        } else {
            let qualifier = identity
                .module
                .rsplit("::")
                .next()
                .filter(|segment| !segment.is_empty())
                .unwrap_or("crate");
            format!("{}.{}", qualifier, name_hint)
        };

        if !self.taken.contains(&base) {
            return base;
        }
        (2..)
            .map(|n| format!("{}{}", base, n))
            .find(|candidate| !self.taken.contains(candidate))
            .unwrap_or(base)
    }

    pub fn mark_in_progress(&mut self, key: &SchemaKey) {
        self.in_progress.insert(key.clone());
    }

    pub fn clear(&mut self, key: &SchemaKey) {
        self.in_progress.remove(key);
    }

    pub fn is_in_progress(&self, key: &SchemaKey) -> bool {
        self.in_progress.contains(key)
    }

    /// Stores the finished schema for a reserved name.
    pub fn put(&mut self, name: &str, schema: Schema) {
        self.schemas.insert(name.to_string(), schema);
    }

    pub fn get(&self, name: &str) -> Option<&Schema> {
        self.schemas.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut Schema> {
        self.schemas.get_mut(name)
    }

    /// The name assigned to `key`, if any.
    pub fn name_of(&self, key: &SchemaKey) -> Option<&str> {
        self.names.get(key).map(String::as_str)
    }

    /// Whether a schema body has been stored under `name`.
    pub fn contains(&self, name: &str) -> bool {
        self.schemas.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    /// Copy of every stored schema, ordered by name.
    pub fn snapshot(&self) -> BTreeMap<String, Schema> {
        self.schemas.clone()
    }

    /// Consumes the registry, returning the stored schemas.
    pub fn into_schemas(self) -> BTreeMap<String, Schema> {
        self.schemas
    }

    /// Records a degradation once and logs it.
    pub fn record(&mut self, degradation: Degradation) {
        if self.degradations.contains(&degradation) {
            return;
        }
        warn!("{}", degradation);
        self.degradations.push(degradation);
    }

    pub fn degradations(&self) -> &[Degradation] {
        &self.degradations
    }
}
