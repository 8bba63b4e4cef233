use crate::config::{AuthKind, Config};
use crate::descriptor::{TypeCatalog, TypeDescriptor};
use crate::error::Degradation;
use crate::inference;
use crate::overrides::{FieldOverride, Overrides, RouteOverride};
use crate::registry::SchemaRegistry;
use crate::relationships;
use crate::routes::{HttpMethod, RouteInfo};
use crate::schema_generator::{Schema, SchemaGenerator};
use crate::type_resolver::resolve_type_expr;
use crate::variants::VariantKind;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

const OPENAPI_VERSION: &str = "3.1.0";
const JSON_MEDIA_TYPE: &str = "application/json";

/// OpenAPI Info object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Info {
    pub title: String,
    pub version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact: Option<Contact>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct License {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Server {
    pub url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI PathItem object - represents all operations for a single path
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
}

/// Security requirement: scheme name to scopes
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

/// OpenAPI Operation object - represents a single API operation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "operationId", skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// Parameters (path, query, header)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(rename = "requestBody", skip_serializing_if = "Option::is_none")]
    pub request_body: Option<RequestBody>,
    /// Responses keyed by status code
    pub responses: BTreeMap<String, Response>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub security: Vec<SecurityRequirement>,
}

/// OpenAPI Parameter object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Parameter location (path, query, header)
    #[serde(rename = "in")]
    pub location: String,
    pub required: bool,
    pub schema: Schema,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// OpenAPI RequestBody object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub required: bool,
    /// Content types and their schemas
    pub content: BTreeMap<String, MediaType>,
}

/// OpenAPI MediaType object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaType {
    pub schema: Schema,
}

/// OpenAPI Response object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<BTreeMap<String, MediaType>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SecurityScheme {
    #[serde(rename = "type")]
    pub scheme_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheme: Option<String>,
    #[serde(rename = "bearerFormat", skip_serializing_if = "Option::is_none")]
    pub bearer_format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "in", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

/// OpenAPI Components object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Components {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub schemas: BTreeMap<String, Schema>,
    #[serde(rename = "securitySchemes", default, skip_serializing_if = "BTreeMap::is_empty")]
    pub security_schemes: BTreeMap<String, SecurityScheme>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
}

/// Complete OpenAPI document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenApiDocument {
    pub openapi: String,
    pub info: Info,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub servers: Vec<Server>,
    pub paths: BTreeMap<String, PathItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub components: Option<Components>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<Tag>,
}

/// A finished document and what was absorbed while building it.
#[derive(Debug, Clone)]
pub struct Assembly {
    pub document: OpenApiDocument,
    pub degradations: Vec<Degradation>,
}

impl PathItem {
    /// Slot for `method`
    pub fn operation_mut(&mut self, method: HttpMethod) -> &mut Option<Operation> {
        match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Options => &mut self.options,
            HttpMethod::Head => &mut self.head,
        }
    }

    pub fn operations(&self) -> impl Iterator<Item = &Operation> {
        [
            &self.get,
            &self.post,
            &self.put,
            &self.delete,
            &self.patch,
            &self.options,
            &self.head,
        ]
        .into_iter()
        .flatten()
    }
}

fn json_content(schema: Schema) -> BTreeMap<String, MediaType> {
    BTreeMap::from([(JSON_MEDIA_TYPE.to_string(), MediaType { schema })])
}

fn security_requirements(schemes: &[String]) -> Vec<SecurityRequirement> {
    schemes
        .iter()
        .map(|scheme| BTreeMap::from([(scheme.clone(), Vec::new())]))
        .collect()
}

/// OpenAPI document builder
///
/// Holds the document-level configuration. Every [`assemble`](Self::assemble)
/// call compiles into its own fresh registry, so builds are independent.
pub struct OpenApiBuilder {
    config: Config,
}

impl OpenApiBuilder {
    /// Create a new OpenApiBuilder with default info
    pub fn new() -> Self {
        Self::from_config(Config::default())
    }

    pub fn from_config(config: Config) -> Self {
        debug!("Initializing OpenApiBuilder");
        Self { config }
    }

    /// Set custom info for the API
    pub fn with_info(mut self, title: String, version: String, description: Option<String>) -> Self {
        self.config.info.title = title;
        self.config.info.version = version;
        self.config.info.description = description;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Assemble the entities, routes and overrides declared in the configuration
    pub fn build(&self, catalog: &TypeCatalog) -> Assembly {
        self.assemble_report(
            catalog,
            &self.config.entities,
            &self.config.routes,
            &self.config.overrides,
        )
    }

    /// Build the document for `entities` (type expressions) and `routes`.
    ///
    /// Never fails: unresolvable types become open schemas.
    pub fn assemble(
        &self,
        catalog: &TypeCatalog,
        entities: &[String],
        routes: &[RouteInfo],
        overrides: &Overrides,
    ) -> OpenApiDocument {
        self.assemble_report(catalog, entities, routes, overrides).document
    }

    /// [`assemble`](Self::assemble), also returning the degradations recorded.
    pub fn assemble_report(
        &self,
        catalog: &TypeCatalog,
        entities: &[String],
        routes: &[RouteInfo],
        overrides: &Overrides,
    ) -> Assembly {
        let mut generator = SchemaGenerator::new(catalog);

        for entity in entities {
            self.add_entity(&mut generator, entity);
        }

        let mut paths: BTreeMap<String, PathItem> = BTreeMap::new();
        for route in routes {
            if self.config.is_excluded(&route.path) {
                debug!("Excluding route {} {}", route.method, route.path);
                continue;
            }
            let operation = self.build_operation(&mut generator, route, overrides);
            let slot = paths
                .entry(route.openapi_path())
                .or_default()
                .operation_mut(route.method);
            if slot.is_some() {
                warn!("Duplicate route {} {}, keeping the last", route.method, route.path);
            }
            *slot = Some(operation);
        }

        let mut registry = generator.into_registry();
        apply_field_overrides(&mut registry, overrides);

        let tags: BTreeSet<&String> = paths
            .values()
            .flat_map(PathItem::operations)
            .flat_map(|op| op.tags.iter())
            .collect();
        let tags = tags
            .into_iter()
            .map(|name| Tag { name: name.clone() })
            .collect();

        let components = Components {
            schemas: registry.snapshot(),
            security_schemes: self.security_schemes(),
        };
        let components =
            (!components.schemas.is_empty() || !components.security_schemes.is_empty())
                .then_some(components);

        info!(
            "Assembled {} paths and {} schemas",
            paths.len(),
            registry.len()
        );
        Assembly {
            document: OpenApiDocument {
                openapi: OPENAPI_VERSION.to_string(),
                info: self.info(),
                servers: self
                    .config
                    .servers
                    .iter()
                    .map(|s| Server {
                        url: s.url.clone(),
                        description: s.description.clone(),
                    })
                    .collect(),
                paths,
                components,
                tags,
            },
            degradations: registry.degradations().to_vec(),
        }
    }

    /// Full schema, Create and Update variants and relationships for an entity.
    fn add_entity(&self, generator: &mut SchemaGenerator, expr: &str) {
        let ty = resolve_type_expr(generator.catalog(), expr);
        let base = generator.compile(&ty);
        let Some(name) = base.ref_name().map(str::to_string) else {
            warn!("Entity `{}` is not a named type, skipping variants", expr);
            return;
        };
        if !matches!(&ty, TypeDescriptor::Object(_)) {
            return;
        }

        generator.variant(&ty, VariantKind::Create);
        generator.variant(&ty, VariantKind::Update);
        let relationships = generator.detect_relationships(&ty);
        if let Some(schema) = generator.registry_mut().get_mut(&name) {
            relationships::attach(schema, &relationships);
        }
        debug!("Registered entity {} with {} relationships", name, relationships.len());
    }

    fn schema_for(generator: &mut SchemaGenerator, expr: &str) -> Schema {
        let ty = resolve_type_expr(generator.catalog(), expr);
        generator.compile(&ty)
    }

    /// Creates an operation for a route from inferred metadata, bound types
    /// and overrides, in that order of increasing precedence.
    fn build_operation(
        &self,
        generator: &mut SchemaGenerator,
        route: &RouteInfo,
        overrides: &Overrides,
    ) -> Operation {
        debug!(
            "Adding route: {} {} ({})",
            route.method,
            route.path,
            route.handler.as_deref().unwrap_or("unnamed handler")
        );

        let path_params = route.path_params();
        let mut parameters: Vec<Parameter> = path_params
            .iter()
            .map(|name| inference::path_parameter(name))
            .collect();
        parameters.extend(inference::query_parameters(route.method, &route.path));

        let request_body = route.request.as_deref().map(|expr| RequestBody {
            description: None,
            required: true,
            content: json_content(Self::schema_for(generator, expr)),
        });

        let mut responses: BTreeMap<String, Response> =
            inference::status_codes(route.method, !path_params.is_empty())
                .into_iter()
                .map(|(code, description)| {
                    (
                        code,
                        Response {
                            description,
                            content: None,
                        },
                    )
                })
                .collect();
        if let Some(expr) = route.response.as_deref() {
            let schema = Self::schema_for(generator, expr);
            if let Some(success) = responses
                .iter_mut()
                .find(|(code, _)| code.starts_with('2'))
                .map(|(_, response)| response)
            {
                success.content = Some(json_content(schema));
            }
        }

        let tags = if route.tags.is_empty() {
            inference::tags(&route.path)
        } else {
            route.tags.clone()
        };

        let mut operation = Operation {
            tags,
            summary: Some(inference::summary(route.method, &route.path)),
            description: None,
            operation_id: Some(inference::operation_id(route.method, &route.path)),
            parameters,
            request_body,
            responses,
            deprecated: false,
            security: Vec::new(),
        };

        for group in overrides.groups_for(&route.path) {
            if !group.tags.is_empty() {
                operation.tags = group.tags.clone();
            }
            operation.security.extend(security_requirements(&group.security));
        }
        if let Some(route_override) = overrides.route_for(route.method, &route.path) {
            apply_route_override(generator, &mut operation, route_override);
        }
        operation
    }

    fn info(&self) -> Info {
        let info = &self.config.info;
        Info {
            title: info.title.clone(),
            version: info.version.clone(),
            description: info.description.clone(),
            contact: info.contact.as_ref().map(|c| Contact {
                name: c.name.clone(),
                url: c.url.clone(),
                email: c.email.clone(),
            }),
            license: info.license.as_ref().map(|l| License {
                name: l.name.clone(),
                url: l.url.clone(),
            }),
        }
    }

    fn security_schemes(&self) -> BTreeMap<String, SecurityScheme> {
        let auth = &self.config.auth;
        let scheme = match auth.kind {
            AuthKind::None => return BTreeMap::new(),
            AuthKind::Bearer => (
                "bearerAuth",
                SecurityScheme {
                    scheme_type: "http".to_string(),
                    scheme: Some(auth.scheme.clone().unwrap_or_else(|| "bearer".to_string())),
                    bearer_format: auth.bearer_format.clone(),
                    name: None,
                    location: None,
                },
            ),
            AuthKind::ApiKey => (
                "apiKeyAuth",
                SecurityScheme {
                    scheme_type: "apiKey".to_string(),
                    scheme: None,
                    bearer_format: None,
                    name: Some(auth.name.clone().unwrap_or_else(|| "X-API-Key".to_string())),
                    location: Some(auth.location.clone().unwrap_or_else(|| "header".to_string())),
                },
            ),
            AuthKind::Basic => (
                "basicAuth",
                SecurityScheme {
                    scheme_type: "http".to_string(),
                    scheme: Some("basic".to_string()),
                    bearer_format: None,
                    name: None,
                    location: None,
                },
            ),
        };
        BTreeMap::from([(scheme.0.to_string(), scheme.1)])
    }
}

impl Default for OpenApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn apply_route_override(
    generator: &mut SchemaGenerator,
    operation: &mut Operation,
    route_override: &RouteOverride,
) {
    if let Some(summary) = &route_override.summary {
        operation.summary = Some(summary.clone());
    }
    if let Some(description) = &route_override.description {
        operation.description = Some(description.clone());
    }
    if !route_override.tags.is_empty() {
        operation.tags = route_override.tags.clone();
    }
    if let Some(deprecated) = route_override.deprecated {
        operation.deprecated = deprecated;
    }
    if !route_override.security.is_empty() {
        operation.security = security_requirements(&route_override.security);
    }
    if let Some(expr) = &route_override.request_body {
        operation.request_body = Some(RequestBody {
            description: None,
            required: true,
            content: json_content(OpenApiBuilder::schema_for(generator, expr)),
        });
    }
    if !route_override.responses.is_empty() {
        operation.responses = route_override
            .responses
            .iter()
            .map(|response| {
                let content = response
                    .body
                    .as_deref()
                    .map(|expr| json_content(OpenApiBuilder::schema_for(generator, expr)));
                (
                    response.status.to_string(),
                    Response {
                        description: response.description.clone(),
                        content,
                    },
                )
            })
            .collect();
    }
}

/// Applies field overrides to the compiled component schemas.
///
/// Overrides for schema `N` also reach its `CreateN` and `UpdateN` entries.
fn apply_field_overrides(registry: &mut SchemaRegistry, overrides: &Overrides) {
    for (schema_name, fields) in &overrides.fields {
        if !registry.contains(schema_name) {
            warn!("Field overrides target unknown schema {}", schema_name);
            continue;
        }

        let variant_names = [VariantKind::Create, VariantKind::Update].map(|kind| kind.name_for(schema_name));
        if let Some(schema) = registry.get_mut(schema_name) {
            apply_to_schema(schema, schema_name, fields, true);
        }
        for name in &variant_names {
            if let Some(schema) = registry.get_mut(name) {
                // Server-assigned properties are absent from variants
                apply_to_schema(schema, name, fields, false);
            }
        }
    }
}

fn apply_to_schema(
    schema: &mut Schema,
    schema_name: &str,
    fields: &BTreeMap<String, FieldOverride>,
    report_missing: bool,
) {
    for (property_name, field) in fields {
        if field.hidden == Some(true) {
            if let Some(properties) = schema.properties.as_mut() {
                properties.remove(property_name);
            }
            if let Some(required) = schema.required.as_mut() {
                required.retain(|name| name != property_name);
                if required.is_empty() {
                    schema.required = None;
                }
            }
            continue;
        }

        let Some(property) = schema
            .properties
            .as_mut()
            .and_then(|properties| properties.get_mut(property_name))
        else {
            if report_missing {
                warn!("Schema {} has no property {}", schema_name, property_name);
            }
            continue;
        };

        let annotates = field.description.is_some()
            || field.example.is_some()
            || field.deprecated.is_some();
        if annotates && property.is_reference() {
            let target = std::mem::take(property);
            property.all_of = Some(vec![target]);
        }
        if let Some(description) = &field.description {
            property.description = Some(description.clone());
        }
        if let Some(example) = &field.example {
            property.example = Some(example.clone());
        }
        if let Some(deprecated) = field.deprecated {
            property.deprecated = deprecated;
        }
    }
}
