//! Documentation overrides applied after compilation.
//!
//! Three scopes exist. Route overrides are keyed `"METHOD /path"`. Group
//! overrides match paths by pattern. Field overrides target one property of
//! a named component schema. Whatever an override sets replaces the inferred
//! or compiled value.

use crate::routes::{openapi_path, HttpMethod};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Overrides for a single operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteOverride {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub deprecated: Option<bool>,
    /// Security scheme names required by the operation
    pub security: Vec<String>,
    /// Type expression replacing the request body
    pub request_body: Option<String>,
    /// Replaces every inferred response when non-empty
    pub responses: Vec<ResponseOverride>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseOverride {
    pub status: u16,
    /// Type expression of the response body, if any
    pub body: Option<String>,
    pub description: String,
}

/// Tags and security applied to every route under a path pattern.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupOverride {
    /// `/api/admin/*`, `/api/v1*` or an exact path
    pub pattern: String,
    pub tags: Vec<String>,
    pub security: Vec<String>,
}

/// Overrides for one property of a component schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldOverride {
    pub description: Option<String>,
    pub example: Option<Value>,
    pub deprecated: Option<bool>,
    /// Removes the property (and its required entry) when true
    pub hidden: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Overrides {
    pub routes: BTreeMap<String, RouteOverride>,
    /// Applied in order; later groups win on conflicting tags
    pub groups: Vec<GroupOverride>,
    /// Schema name to property name to override
    pub fields: BTreeMap<String, BTreeMap<String, FieldOverride>>,
}

/// Normalizes a `"METHOD /path"` key: the method is upper-cased and the path
/// written in `{param}` form. A key without a method means `GET`.
pub fn route_key(key: &str) -> String {
    let key = key.trim();
    let (method, path) = match key.split_once(char::is_whitespace) {
        Some((method, path)) => (method.to_ascii_uppercase(), path.trim()),
        None => ("GET".to_string(), key),
    };
    format!("{} {}", method, openapi_path(path))
}

/// Whether `path` falls under a group pattern. A trailing `/*` or `*` makes
/// the pattern a prefix; anything else must match exactly.
pub fn matches_group(path: &str, pattern: &str) -> bool {
    let path = openapi_path(path);
    let pattern = openapi_path(pattern);
    if let Some(prefix) = pattern.strip_suffix("/*") {
        return path.starts_with(prefix);
    }
    if let Some(prefix) = pattern.strip_suffix('*') {
        return path.starts_with(prefix);
    }
    path == pattern
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty() && self.groups.is_empty() && self.fields.is_empty()
    }

    /// Override entry for `"METHOD /path"`, created on first use.
    pub fn route(&mut self, key: &str) -> &mut RouteOverride {
        self.routes.entry(route_key(key)).or_default()
    }

    /// Group entry for `pattern`, created on first use.
    pub fn group(&mut self, pattern: &str) -> &mut GroupOverride {
        let index = match self.groups.iter().position(|g| g.pattern == pattern) {
            Some(index) => index,
            None => {
                self.groups.push(GroupOverride {
                    pattern: pattern.to_string(),
                    ..Default::default()
                });
                self.groups.len() - 1
            }
        };
        &mut self.groups[index]
    }

    /// Override entry for `schema.property`, created on first use.
    pub fn field(&mut self, schema: &str, property: &str) -> &mut FieldOverride {
        self.fields
            .entry(schema.to_string())
            .or_default()
            .entry(property.to_string())
            .or_default()
    }

    /// The route override for an operation. Keys loaded from a manifest may
    /// be written in any accepted form.
    pub fn route_for(&self, method: HttpMethod, path: &str) -> Option<&RouteOverride> {
        let wanted = format!("{} {}", method, openapi_path(path));
        self.routes
            .get(&wanted)
            .or_else(|| {
                self.routes
                    .iter()
                    .find(|(key, _)| route_key(key) == wanted)
                    .map(|(_, route)| route)
            })
    }

    /// Group overrides whose pattern covers `path`, in declaration order.
    pub fn groups_for<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a GroupOverride> + 'a {
        self.groups
            .iter()
            .filter(move |group| matches_group(path, &group.pattern))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_route_keys() {
        assert_eq!(route_key("post /users"), "POST /users");
        assert_eq!(route_key("GET /users/:id"), "GET /users/{id}");
        assert_eq!(route_key("/health"), "GET /health");
    }

    #[test]
    fn test_group_patterns() {
        assert!(matches_group("/api/admin/users", "/api/admin/*"));
        assert!(matches_group("/api/v1/users", "/api/v1*"));
        assert!(matches_group("/health", "/health"));
        assert!(!matches_group("/healthz", "/health"));
        assert!(!matches_group("/api/public", "/api/admin/*"));
    }

    #[test]
    fn test_builders_and_lookup() {
        let mut overrides = Overrides::new();
        assert!(overrides.is_empty());

        overrides.route("get /users/:id").summary = Some("Fetch one user".into());
        overrides.group("/admin/*").tags.push("Admin".into());
        overrides.group("/admin/*").security.push("bearerAuth".into());
        overrides.field("User", "email").hidden = Some(true);

        let route = overrides.route_for(HttpMethod::Get, "/users/{id}").unwrap();
        assert_eq!(route.summary.as_deref(), Some("Fetch one user"));
        assert!(overrides.route_for(HttpMethod::Delete, "/users/:id").is_none());

        assert_eq!(overrides.groups.len(), 1);
        let groups: Vec<_> = overrides.groups_for("/admin/stats").collect();
        assert_eq!(groups[0].security, vec!["bearerAuth"]);
        assert_eq!(overrides.fields["User"]["email"].hidden, Some(true));
    }

    #[test]
    fn test_manifest_keys_in_any_form() {
        let overrides: Overrides = serde_yaml::from_str(
            r#"
routes:
  "delete /users/:id":
    deprecated: true
    responses:
      - status: 204
        description: Gone
fields:
  User:
    email:
      example: someone@example.com
"#,
        )
        .unwrap();

        let route = overrides.route_for(HttpMethod::Delete, "/users/{id}").unwrap();
        assert_eq!(route.deprecated, Some(true));
        assert_eq!(route.responses[0].status, 204);
        assert_eq!(
            overrides.fields["User"]["email"].example,
            Some(Value::String("someone@example.com".into()))
        );
    }
}
