use openapi_from_types::{
    cli::{self, CliArgs},
    config::ConfigManager,
    descriptor::TypeCatalog,
    engine::DocsEngine,
    openapi_builder::{OpenApiBuilder, OpenApiDocument},
    overrides::Overrides,
    parser::AstParser,
    routes::{HttpMethod, RouteInfo},
    scanner::FileScanner,
    schema_generator::Schema,
    serializer::{load_catalog, serialize_json, serialize_yaml},
    type_resolver::TypeResolver,
};
use clap::Parser;
use pretty_assertions::assert_eq;
use std::ffi::OsString;
use tempfile::TempDir;

/// Helper function to create a temporary test project
fn create_test_project(files: Vec<(&str, &str)>) -> TempDir {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");

    for (path, content) in files {
        let file_path = temp_dir.path().join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&file_path, content).expect("Failed to write test file");
    }

    temp_dir
}

const MODELS: &str = r#"
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    #[db(primary_key)]
    pub id: u64,
    #[validate(required, length(max = 100))]
    pub name: String,
    #[validate(email)]
    #[docs(format = "uri", description = "Profile link")]
    pub homepage: Option<String>,
    #[db(auto_create_time)]
    pub created_at: DateTime<Utc>,
    pub orders: Vec<crate::billing::Order>,
}
"#;

const BILLING: &str = r#"
pub struct Order {
    pub id: u64,
    pub user_id: u64,
    pub items: Vec<Item>,
}

pub struct Item {
    #[validate(range(min = 1))]
    pub quantity: u32,
}
"#;

const SHOP: &str = r#"
pub struct Item {
    pub sku: String,
    #[validate(length(max = 100))]
    #[db(size = 50)]
    pub label: String,
}

pub struct Node {
    pub value: String,
    pub children: Vec<Node>,
}
"#;

const MANIFEST: &str = r#"
info:
  title: Shop API
  version: 2.1.0
auth:
  type: bearer
entities: [User]
exclude_prefixes: [/internal]
routes:
  - method: GET
    path: /users/:id
    response: User
  - method: POST
    path: /users
    request: User
    response: User
  - method: GET
    path: /shop/items
    response: Vec<shop::Item>
  - method: GET
    path: /internal/health
overrides:
  routes:
    "GET /users/{id}":
      summary: Fetch one user
  fields:
    User:
      name:
        example: Ada
"#;

fn project() -> TempDir {
    create_test_project(vec![
        ("src/models.rs", MODELS),
        ("src/billing.rs", BILLING),
        ("src/shop.rs", SHOP),
        ("src/broken.rs", "pub struct {"),
        ("openapi-docs.yaml", MANIFEST),
    ])
}

fn catalog_of(files: &[(&str, &str)]) -> TypeCatalog {
    let parsed = files
        .iter()
        .map(|(path, code)| AstParser::parse_source(std::path::Path::new(path), code).unwrap())
        .collect();
    TypeResolver::new(parsed).into_catalog()
}

fn schemas(doc: &OpenApiDocument) -> &std::collections::BTreeMap<String, Schema> {
    &doc.components.as_ref().expect("document has components").schemas
}

fn property<'a>(schema: &'a Schema, name: &str) -> &'a Schema {
    &schema.properties.as_ref().expect("object schema")[name]
}

#[test]
fn test_end_to_end_generation() {
    let temp_dir = project();

    let scan_result = FileScanner::new(temp_dir.path().to_path_buf())
        .scan()
        .expect("Failed to scan directory");
    assert_eq!(scan_result.rust_files.len(), 4);

    let parsed_files: Vec<_> = AstParser::parse_files(&scan_result.rust_files)
        .into_iter()
        .filter_map(Result::ok)
        .collect();
    assert_eq!(parsed_files.len(), 3, "broken file should be skipped");

    let catalog = TypeResolver::new(parsed_files).into_catalog();
    let config = ConfigManager::load(None, temp_dir.path()).expect("manifest should load");
    let assembly = OpenApiBuilder::from_config(config).build(&catalog);
    let doc = &assembly.document;

    assert_eq!(doc.info.title, "Shop API");
    assert_eq!(doc.info.version, "2.1.0");
    assert_eq!(
        doc.paths.keys().collect::<Vec<_>>(),
        vec!["/shop/items", "/users", "/users/{id}"]
    );

    let get_user = doc.paths["/users/{id}"].get.as_ref().unwrap();
    assert_eq!(get_user.summary.as_deref(), Some("Fetch one user"));
    assert_eq!(get_user.parameters[0].name, "id");

    let user = &schemas(doc)["User"];
    assert_eq!(property(user, "name").example, Some(serde_json::json!("Ada")));
    assert!(property(user, "createdAt").read_only);
    assert!(user.extensions.contains_key("x-relationships"));

    let names: Vec<_> = schemas(doc).keys().cloned().collect();
    assert!(names.contains(&"CreateUser".to_string()));
    assert!(names.contains(&"UpdateUser".to_string()));
    assert!(names.contains(&"Order".to_string()));

    let security = &doc.components.as_ref().unwrap().security_schemes;
    assert!(security.contains_key("bearerAuth"));
}

#[test]
fn test_scenario_required_with_max_length() {
    let catalog = catalog_of(&[("src/models.rs", MODELS), ("src/billing.rs", BILLING)]);
    let doc = OpenApiBuilder::new().assemble(&catalog, &["User".into()], &[], &Overrides::new());
    let user = &schemas(&doc)["User"];

    assert!(user.required.as_ref().unwrap().contains(&"name".to_string()));
    assert_eq!(property(user, "name").max_length, Some(100));
}

#[test]
fn test_scenario_self_reference_terminates() {
    let catalog = catalog_of(&[("src/shop.rs", SHOP)]);
    let routes = vec![RouteInfo::new(HttpMethod::Get, "/nodes").with_response("Node")];
    let doc = OpenApiBuilder::new().assemble(&catalog, &[], &routes, &Overrides::new());

    let node = &schemas(&doc)["Node"];
    let children = property(node, "children");
    assert_eq!(children.schema_type.as_deref(), Some("array"));
    assert_eq!(
        children.items.as_ref().unwrap().reference.as_deref(),
        Some("#/components/schemas/Node")
    );
}

#[test]
fn test_scenario_create_and_update_variants() {
    let catalog = catalog_of(&[("src/models.rs", MODELS), ("src/billing.rs", BILLING)]);
    let doc = OpenApiBuilder::new().assemble(&catalog, &["User".into()], &[], &Overrides::new());

    let create = &schemas(&doc)["CreateUser"];
    let create_fields: Vec<_> = create.properties.as_ref().unwrap().keys().cloned().collect();
    assert!(!create_fields.contains(&"id".to_string()));
    assert!(!create_fields.contains(&"createdAt".to_string()));
    assert!(create_fields.contains(&"name".to_string()));
    assert_eq!(
        create.required,
        Some(vec!["name".to_string(), "orders".to_string()])
    );

    let update = &schemas(&doc)["UpdateUser"];
    let update_fields: Vec<_> = update.properties.as_ref().unwrap().keys().cloned().collect();
    assert_eq!(update_fields, create_fields);
    assert_eq!(update.required, None);
}

#[test]
fn test_scenario_docs_format_wins() {
    let catalog = catalog_of(&[("src/models.rs", MODELS), ("src/billing.rs", BILLING)]);
    let doc = OpenApiBuilder::new().assemble(&catalog, &["User".into()], &[], &Overrides::new());
    let homepage = property(&schemas(&doc)["User"], "homepage");

    assert_eq!(homepage.format.as_deref(), Some("uri"));
    assert_eq!(homepage.description.as_deref(), Some("Profile link"));
}

#[test]
fn test_scenario_same_name_in_two_modules() {
    let catalog = catalog_of(&[("src/billing.rs", BILLING), ("src/shop.rs", SHOP)]);
    let routes = vec![
        RouteInfo::new(HttpMethod::Get, "/orders/:id").with_response("Order"),
        RouteInfo::new(HttpMethod::Get, "/items").with_response("Vec<shop::Item>"),
    ];

    let first = OpenApiBuilder::new().assemble_report(&catalog, &[], &routes, &Overrides::new());
    let second = OpenApiBuilder::new().assemble_report(&catalog, &[], &routes, &Overrides::new());
    assert_eq!(first.document, second.document);

    let names: Vec<_> = schemas(&first.document).keys().cloned().collect();
    assert_eq!(names, vec!["Item", "Order", "shop.Item"]);
    assert!(property(&schemas(&first.document)["Item"], "quantity").minimum.is_some());
    assert!(property(&schemas(&first.document)["shop.Item"], "sku").schema_type.is_some());
    assert_eq!(first.degradations.len(), 1);
}

#[test]
fn test_stricter_length_bound_wins() {
    let catalog = catalog_of(&[("src/shop.rs", SHOP)]);
    let routes = vec![RouteInfo::new(HttpMethod::Get, "/items").with_response("Item")];
    let doc = OpenApiBuilder::new().assemble(&catalog, &[], &routes, &Overrides::new());

    assert_eq!(property(&schemas(&doc)["Item"], "label").max_length, Some(50));
}

#[test]
fn test_serialized_output_is_deterministic() {
    let catalog = catalog_of(&[("src/models.rs", MODELS), ("src/billing.rs", BILLING)]);
    let build = || {
        let doc = OpenApiBuilder::new().assemble(&catalog, &["User".into()], &[], &Overrides::new());
        (serialize_yaml(&doc).unwrap(), serialize_json(&doc).unwrap())
    };

    assert_eq!(build(), build());
}

#[test]
fn test_live_engine_serves_fresh_documents() {
    let catalog = catalog_of(&[("src/models.rs", MODELS), ("src/billing.rs", BILLING)]);
    let config = ConfigManager::from_str(MANIFEST, std::path::Path::new("openapi-docs.yaml")).unwrap();

    let live = DocsEngine::new(catalog.clone(), config.clone()).with_live(true);
    let first = live.build();
    let second = live.build();
    assert_eq!(first.generation + 1, second.generation);
    assert_eq!(first.document, second.document);

    let once = DocsEngine::new(catalog, config);
    assert!(std::sync::Arc::ptr_eq(&once.build(), &once.build()));
}

#[test]
fn test_cli_run_writes_document_and_catalog() {
    let temp_dir = project();
    let output = temp_dir.path().join("out/openapi.json");
    let catalog_file = temp_dir.path().join("out/catalog.json");

    let args = CliArgs::parse_from([
        OsString::from("openapi-from-types"),
        temp_dir.path().into(),
        "-f".into(),
        "json".into(),
        "-o".into(),
        output.clone().into(),
        "--dump-catalog".into(),
        catalog_file.clone().into(),
        "--title".into(),
        "Overridden".into(),
    ]);
    cli::run(cli::parse_args_from_parsed(args).unwrap()).expect("run should succeed");

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
    assert_eq!(written["info"]["title"], "Overridden");
    assert_eq!(written["info"]["version"], "2.1.0");
    assert!(written["components"]["schemas"]["User"].is_object());

    let catalog = load_catalog(&catalog_file).unwrap();
    assert!(catalog.find("User").is_some());
    assert!(catalog.find("shop::Item").is_some());
}
