//! Route descriptions consumed by the document assembler.
//!
//! Routes are not discovered here. They arrive as plain data, usually from
//! the manifest (see [`crate::config`]), and each one names the request and
//! response types bound to it as Rust type expressions such as `Vec<User>`.
//!
//! Path templates may use `:param`, `*param` or `{param}` segments.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// HTTP methods an operation can be documented under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
        }
    }

    /// Whether requests with this method normally carry a body
    pub fn has_body(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(HttpMethod::Get),
            "POST" => Ok(HttpMethod::Post),
            "PUT" => Ok(HttpMethod::Put),
            "DELETE" => Ok(HttpMethod::Delete),
            "PATCH" => Ok(HttpMethod::Patch),
            "OPTIONS" => Ok(HttpMethod::Options),
            "HEAD" => Ok(HttpMethod::Head),
            other => Err(Error::InvalidArgument(format!("unknown HTTP method `{}`", other))),
        }
    }
}

/// One documented API endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RouteInfo {
    pub method: HttpMethod,
    /// Path template, e.g. `/users/:id`
    pub path: String,
    /// Handler function name, used for logging only
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub handler: Option<String>,
    /// Request body type expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request: Option<String>,
    /// Success response type expression
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// Explicit tags; inferred from the path when empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl RouteInfo {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            handler: None,
            request: None,
            response: None,
            tags: Vec::new(),
        }
    }

    pub fn with_request(mut self, ty: impl Into<String>) -> Self {
        self.request = Some(ty.into());
        self
    }

    pub fn with_response(mut self, ty: impl Into<String>) -> Self {
        self.response = Some(ty.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    /// Path parameter names in declaration order
    pub fn path_params(&self) -> Vec<String> {
        self.path
            .split('/')
            .filter_map(param_name)
            .map(str::to_string)
            .collect()
    }

    /// The path with every parameter segment written as `{name}`
    pub fn openapi_path(&self) -> String {
        openapi_path(&self.path)
    }
}

/// The parameter name of a path segment, if it is one.
pub fn param_name(segment: &str) -> Option<&str> {
    segment
        .strip_prefix(':')
        .or_else(|| segment.strip_prefix('*'))
        .or_else(|| segment.strip_prefix('{').and_then(|s| s.strip_suffix('}')))
        .filter(|name| !name.is_empty())
}

/// Convert `:param` and `*param` segments to OpenAPI `{param}` form.
pub fn openapi_path(path: &str) -> String {
    path.split('/')
        .map(|segment| match param_name(segment) {
            Some(name) => format!("{{{}}}", name),
            None => segment.to_string(),
        })
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_method_parsing_and_display() {
        assert_eq!("get".parse::<HttpMethod>().unwrap(), HttpMethod::Get);
        assert_eq!(" Patch ".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert!("TRACE".parse::<HttpMethod>().is_err());
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
        assert!(HttpMethod::Put.has_body());
        assert!(!HttpMethod::Get.has_body());
    }

    #[test]
    fn test_path_conversion() {
        assert_eq!(openapi_path("/users/:id"), "/users/{id}");
        assert_eq!(openapi_path("/files/*path"), "/files/{path}");
        assert_eq!(openapi_path("/orgs/{org}/users"), "/orgs/{org}/users");
        assert_eq!(openapi_path("/"), "/");
        assert_eq!(openapi_path("/users/:"), "/users/:");
    }

    #[test]
    fn test_path_params() {
        let route = RouteInfo::new(HttpMethod::Get, "/orgs/{org_id}/users/:id/files/*rest");
        assert_eq!(route.path_params(), vec!["org_id", "id", "rest"]);
        assert!(RouteInfo::new(HttpMethod::Get, "/health").path_params().is_empty());
    }

    #[test]
    fn test_route_deserializes_with_defaults() {
        let route: RouteInfo =
            serde_yaml::from_str("method: POST\npath: /users\nrequest: CreateUser\n").unwrap();

        assert_eq!(
            route,
            RouteInfo::new(HttpMethod::Post, "/users").with_request("CreateUser")
        );
    }
}
