//! Serialization module for writing OpenAPI documents and type catalogs.
//!
//! Documents go out as YAML or pretty JSON. The type catalog can also be
//! exported as JSON and loaded back, so a document can be rebuilt without
//! re-parsing the sources.

use crate::descriptor::TypeCatalog;
use crate::openapi_builder::OpenApiDocument;
use anyhow::{Context, Result};
use log::debug;
use std::fs;
use std::path::Path;

/// Serializes an OpenAPI document to YAML format.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_yaml(doc: &OpenApiDocument) -> Result<String> {
    debug!("Serializing OpenAPI document to YAML");
    serde_yaml::to_string(doc).context("Failed to serialize OpenAPI document to YAML")
}

/// Serializes an OpenAPI document to JSON format with pretty printing.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_json(doc: &OpenApiDocument) -> Result<String> {
    debug!("Serializing OpenAPI document to JSON");
    serde_json::to_string_pretty(doc).context("Failed to serialize OpenAPI document to JSON")
}

/// Serializes a type catalog to pretty JSON.
pub fn serialize_catalog(catalog: &TypeCatalog) -> Result<String> {
    debug!("Serializing catalog of {} types", catalog.len());
    serde_json::to_string_pretty(catalog).context("Failed to serialize type catalog")
}

/// Reads a catalog previously written by [`serialize_catalog`].
pub fn load_catalog(path: &Path) -> Result<TypeCatalog> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read catalog: {}", path.display()))?;
    let catalog: TypeCatalog = serde_json::from_str(&content)
        .with_context(|| format!("Invalid catalog: {}", path.display()))?;
    debug!("Loaded {} types from {}", catalog.len(), path.display());
    Ok(catalog)
}

/// Writes string content to a file.
///
/// Creates the file (and missing parent directories) or overwrites it.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::{FieldDeclaration, FieldTags, Primitive, TypeDef, TypeDescriptor, TypeIdentity};
    use crate::openapi_builder::OpenApiBuilder;
    use crate::overrides::Overrides;
    use crate::routes::{HttpMethod, RouteInfo};
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    fn create_test_catalog() -> TypeCatalog {
        TypeCatalog::from(vec![TypeDef::structure(
            TypeIdentity::new("crate::models", "User"),
            vec![
                FieldDeclaration::new("id", TypeDescriptor::Primitive(Primitive::Integer { bits: 32, signed: false })),
                FieldDeclaration::new("name", TypeDescriptor::Primitive(Primitive::String))
                    .with_tags(FieldTags::default().validate("required, length(max = 100)")),
            ],
        )])
    }

    /// Helper function to create a small document for testing
    fn create_test_document() -> OpenApiDocument {
        let routes = vec![RouteInfo::new(HttpMethod::Get, "/users/:id").with_response("User")];
        OpenApiBuilder::new()
            .with_info("Test API".into(), "1.0.0".into(), Some("A test API".into()))
            .assemble(&create_test_catalog(), &[], &routes, &Overrides::new())
    }

    #[test]
    fn test_serialize_yaml() {
        let yaml = serialize_yaml(&create_test_document()).unwrap();

        assert!(yaml.contains("openapi: 3.1.0"));
        assert!(yaml.contains("title: Test API"));
        assert!(yaml.contains("/users/{id}:"));
        assert!(yaml.contains("$ref: '#/components/schemas/User'"));
        assert!(yaml.contains("maxLength: 100"));
    }

    #[test]
    fn test_serialize_json() {
        let json = serialize_json(&create_test_document()).unwrap();
        assert!(json.lines().count() > 5, "Pretty printed JSON should have multiple lines");

        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["openapi"], "3.1.0");
        assert_eq!(parsed["info"]["title"], "Test API");
        assert_eq!(
            parsed["paths"]["/users/{id}"]["get"]["responses"]["200"]["content"]["application/json"]["schema"]["$ref"],
            "#/components/schemas/User"
        );
        assert_eq!(
            parsed["components"]["schemas"]["User"]["required"],
            serde_json::json!(["id", "name"])
        );
    }

    #[test]
    fn test_roundtrip_yaml_and_json() {
        let doc = create_test_document();

        let from_yaml: OpenApiDocument = serde_yaml::from_str(&serialize_yaml(&doc).unwrap()).unwrap();
        let from_json: OpenApiDocument = serde_json::from_str(&serialize_json(&doc).unwrap()).unwrap();

        assert_eq!(from_yaml, doc);
        assert_eq!(from_json, doc);
    }

    #[test]
    fn test_write_to_file_creates_directories_and_overwrites() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("subdir").join("nested").join("openapi.yaml");

        write_to_file("initial content", &file_path).unwrap();
        write_to_file("new content", &file_path).unwrap();

        assert_eq!(fs::read_to_string(&file_path).unwrap(), "new content");
    }

    #[test]
    fn test_catalog_export_and_load() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("catalog.json");
        let catalog = create_test_catalog();

        write_to_file(&serialize_catalog(&catalog).unwrap(), &file_path).unwrap();
        let loaded = load_catalog(&file_path).unwrap();

        assert_eq!(loaded, catalog);
        assert!(load_catalog(&temp_dir.path().join("missing.json")).is_err());
    }
}
