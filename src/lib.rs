//! OpenAPI from types - schema compilation from Rust type definitions.
//!
//! This library compiles a graph of Rust type definitions into OpenAPI 3.1
//! component schemas. Field metadata comes from four attribute namespaces
//! (`serde`, `validate`, `db` and `docs`) and is merged with a fixed
//! precedence. Entity types additionally get Create/Update variant schemas
//! and relationship metadata.
//!
//! # Architecture
//!
//! 1. [`scanner`] - Recursively scans project directories for Rust files
//! 2. [`parser`] - Parses Rust source files into ASTs
//! 3. [`type_resolver`] - Builds the [`descriptor::TypeCatalog`] from the ASTs
//! 4. [`metadata`] - Parses and merges per-field annotations
//! 5. [`schema_generator`] - Compiles descriptors into schemas, deduplicated
//!    through the [`registry`]
//! 6. [`variants`] and [`relationships`] - Create/Update views and associations
//! 7. [`openapi_builder`] - Assembles schemas, [`routes`] and [`overrides`]
//!    into a document
//! 8. [`engine`] - Publishes documents to concurrent readers
//! 9. [`serializer`] - Serializes the document to YAML or JSON
//!
//! # Example Usage
//!
//! ```no_run
//! use openapi_from_types::{
//!     openapi_builder::OpenApiBuilder,
//!     overrides::Overrides,
//!     parser::AstParser,
//!     routes::{HttpMethod, RouteInfo},
//!     scanner::FileScanner,
//!     serializer::serialize_yaml,
//!     type_resolver::TypeResolver,
//! };
//! use std::path::PathBuf;
//!
//! let scan_result = FileScanner::new(PathBuf::from("./my-project")).scan().unwrap();
//! let parsed_files: Vec<_> = AstParser::parse_files(&scan_result.rust_files)
//!     .into_iter()
//!     .filter_map(Result::ok)
//!     .collect();
//! let catalog = TypeResolver::new(parsed_files).into_catalog();
//!
//! let routes = vec![RouteInfo::new(HttpMethod::Get, "/users/:id").with_response("User")];
//! let document = OpenApiBuilder::new().assemble(&catalog, &["User".to_string()], &routes, &Overrides::new());
//!
//! println!("{}", serialize_yaml(&document).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod cli;
pub mod config;
pub mod descriptor;
pub mod engine;
pub mod error;
pub mod inference;
pub mod metadata;
pub mod openapi_builder;
pub mod overrides;
pub mod parser;
pub mod registry;
pub mod relationships;
pub mod routes;
pub mod scanner;
pub mod schema_generator;
pub mod serializer;
pub mod type_resolver;
pub mod variants;
