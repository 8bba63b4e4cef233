//! Operation metadata inferred from the method and path of a route.
//!
//! Everything here is a fallback: explicit route data and overrides replace it.

use crate::openapi_builder::Parameter;
use crate::routes::{param_name, HttpMethod};
use crate::schema_generator::Schema;
use convert_case::{Case, Casing};
use std::collections::BTreeMap;

/// Leading segments that never name a resource.
const API_PREFIXES: &[&str] = &["api", "v1", "v2", "v3"];

fn segments(path: &str) -> Vec<&str> {
    path.trim_start_matches('/').split('/').collect()
}

fn is_prefix(segment: &str) -> bool {
    API_PREFIXES.contains(&segment.to_ascii_lowercase().as_str())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Naive plural to singular: `categories` -> `category`, `boxes` -> `box`,
/// `users` -> `user`. Words ending in `ss` are left alone.
pub fn singularize(word: &str) -> String {
    if let Some(stem) = word.strip_suffix("ies") {
        return format!("{}y", stem);
    }
    if ["ses", "xes", "zes"].iter().any(|suffix| word.ends_with(suffix)) {
        return word[..word.len() - 2].to_string();
    }
    if word.ends_with('s') && !word.ends_with("ss") {
        return word[..word.len() - 1].to_string();
    }
    word.to_string()
}

/// A readable summary such as `List all users` or `Get a user by ID`.
pub fn summary(method: HttpMethod, path: &str) -> String {
    let segments = segments(path);
    let mut resource = "";
    let mut parent = "";
    for segment in &segments {
        if is_prefix(segment) || segment.is_empty() || param_name(segment).is_some() {
            continue;
        }
        parent = resource;
        resource = segment;
    }

    let fallback = || format!("{} {}", method, path);
    if resource.is_empty() {
        return fallback();
    }

    let has_param = segments.iter().any(|s| param_name(s).is_some());
    let is_detail = segments
        .last()
        .map_or(false, |last| param_name(last).is_some());
    let singular = singularize(resource);

    match method {
        HttpMethod::Get if is_detail => format!("Get a {} by ID", singular),
        HttpMethod::Get if !parent.is_empty() && has_param => {
            format!("List {} for a {}", resource, singularize(parent))
        }
        HttpMethod::Get => format!("List all {}", resource),
        HttpMethod::Post => format!("Create a new {}", singular),
        HttpMethod::Put => format!("Update a {} by ID", singular),
        HttpMethod::Patch => format!("Partially update a {} by ID", singular),
        HttpMethod::Delete => format!("Delete a {} by ID", singular),
        _ => fallback(),
    }
}

/// `GET /users/:id/posts` becomes `getUsersByIdPosts`.
pub fn operation_id(method: HttpMethod, path: &str) -> String {
    let mut id = method.as_str().to_ascii_lowercase();
    for segment in segments(path).into_iter().filter(|s| !s.is_empty()) {
        match param_name(segment) {
            Some(name) if segment.starts_with('*') => id.push_str(&capitalize(name)),
            Some(name) => {
                id.push_str("By");
                id.push_str(&capitalize(name));
            }
            None => id.push_str(&capitalize(segment)),
        }
    }
    id
}

/// The first meaningful path segment after API prefixes, in title case.
pub fn tags(path: &str) -> Vec<String> {
    segments(path)
        .into_iter()
        .find(|segment| !is_prefix(segment))
        .filter(|segment| !segment.is_empty() && param_name(segment).is_none())
        .map(|segment| vec![segment.replace('-', "_").to_case(Case::Title)])
        .unwrap_or_default()
}

/// Default response codes with their descriptions.
pub fn status_codes(method: HttpMethod, has_path_params: bool) -> BTreeMap<String, String> {
    let mut codes = BTreeMap::new();
    let (success, description) = match method {
        HttpMethod::Post => ("201", "Resource created"),
        HttpMethod::Put | HttpMethod::Patch => ("200", "Resource updated"),
        HttpMethod::Delete => ("204", "Resource deleted"),
        _ => ("200", "Successful response"),
    };
    codes.insert(success.to_string(), description.to_string());

    if method.has_body() {
        codes.insert("400".to_string(), "Invalid request body".to_string());
    }
    if has_path_params {
        codes.insert("404".to_string(), "Resource not found".to_string());
    }
    codes.insert("500".to_string(), "Internal server error".to_string());
    codes
}

fn is_identifier(param: &str) -> bool {
    param.to_ascii_lowercase().ends_with("id")
}

/// A path parameter described from its name.
pub fn path_parameter(name: &str) -> Parameter {
    let lower = name.to_ascii_lowercase();
    let description = if lower == "id" {
        "Unique identifier".to_string()
    } else if is_identifier(name) {
        let resource = lower
            .strip_suffix("_id")
            .or_else(|| lower.strip_suffix("id"))
            .unwrap_or(&lower);
        format!("{} identifier", capitalize(resource))
    } else if lower == "slug" {
        "URL-friendly identifier".to_string()
    } else {
        format!("{} value", capitalize(name))
    };

    let schema = if is_identifier(name) {
        Schema {
            format: Some("int64".to_string()),
            ..Schema::typed("integer")
        }
    } else {
        Schema::typed("string")
    };

    Parameter {
        name: name.to_string(),
        location: "path".to_string(),
        required: true,
        schema,
        description: Some(description),
    }
}

/// Query parameters implied by the route: a `q` search string on
/// `GET .../search` style collection endpoints.
pub fn query_parameters(method: HttpMethod, path: &str) -> Vec<Parameter> {
    if method != HttpMethod::Get {
        return Vec::new();
    }
    let last = segments(path).last().copied().unwrap_or_default();
    if param_name(last).is_some() || !last.to_ascii_lowercase().contains("search") {
        return Vec::new();
    }
    vec![Parameter {
        name: "q".to_string(),
        location: "query".to_string(),
        required: false,
        schema: Schema::typed("string"),
        description: Some("Search query string".to_string()),
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_singularize() {
        assert_eq!(singularize("categories"), "category");
        assert_eq!(singularize("boxes"), "box");
        assert_eq!(singularize("users"), "user");
        assert_eq!(singularize("address"), "address");
        assert_eq!(singularize("data"), "data");
    }

    #[test]
    fn test_summaries() {
        assert_eq!(summary(HttpMethod::Get, "/api/v1/users"), "List all users");
        assert_eq!(summary(HttpMethod::Get, "/users/:id"), "Get a user by ID");
        assert_eq!(
            summary(HttpMethod::Get, "/users/{id}/posts"),
            "List posts for a user"
        );
        assert_eq!(summary(HttpMethod::Post, "/categories"), "Create a new category");
        assert_eq!(summary(HttpMethod::Patch, "/users/:id"), "Partially update a user by ID");
        assert_eq!(summary(HttpMethod::Delete, "/users/:id"), "Delete a user by ID");
        assert_eq!(summary(HttpMethod::Get, "/api"), "GET /api");
        assert_eq!(summary(HttpMethod::Head, "/users"), "HEAD /users");
    }

    #[test]
    fn test_operation_ids() {
        assert_eq!(operation_id(HttpMethod::Get, "/users"), "getUsers");
        assert_eq!(operation_id(HttpMethod::Get, "/users/:id/posts"), "getUsersByIdPosts");
        assert_eq!(operation_id(HttpMethod::Delete, "/users/{id}"), "deleteUsersById");
        assert_eq!(operation_id(HttpMethod::Get, "/files/*path"), "getFilesPath");
    }

    #[test]
    fn test_tags() {
        assert_eq!(tags("/api/v1/users/:id"), vec!["Users"]);
        assert_eq!(tags("/order-items"), vec!["Order Items"]);
        assert_eq!(tags("/api/:tenant/users"), Vec::<String>::new());
        assert_eq!(tags("/api"), Vec::<String>::new());
    }

    #[test]
    fn test_status_codes() {
        let codes = status_codes(HttpMethod::Post, false);
        assert_eq!(codes.keys().collect::<Vec<_>>(), vec!["201", "400", "500"]);

        let codes = status_codes(HttpMethod::Delete, true);
        assert_eq!(codes.keys().collect::<Vec<_>>(), vec!["204", "404", "500"]);
        assert_eq!(codes["204"], "Resource deleted");
    }

    #[test]
    fn test_path_parameters() {
        let id = path_parameter("id");
        assert_eq!(id.description.as_deref(), Some("Unique identifier"));
        assert_eq!(id.schema.schema_type.as_deref(), Some("integer"));

        let user = path_parameter("user_id");
        assert_eq!(user.description.as_deref(), Some("User identifier"));

        let slug = path_parameter("slug");
        assert_eq!(slug.description.as_deref(), Some("URL-friendly identifier"));
        assert_eq!(slug.schema, Schema::typed("string"));
    }

    #[test]
    fn test_search_query_parameter() {
        assert_eq!(query_parameters(HttpMethod::Get, "/users/search")[0].name, "q");
        assert!(query_parameters(HttpMethod::Get, "/users").is_empty());
        assert!(query_parameters(HttpMethod::Post, "/search").is_empty());
    }
}
