use crate::config::{Config, ConfigManager};
use crate::descriptor::TypeCatalog;
use crate::engine::DocsEngine;
use crate::parser::{AstParser, ParsedFile};
use crate::scanner::FileScanner;
use crate::serializer::{load_catalog, serialize_catalog, serialize_json, serialize_yaml, write_to_file};
use crate::type_resolver::TypeResolver;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{debug, info, warn};
use std::path::{Path, PathBuf};

/// OpenAPI from types - compile Rust type definitions into an OpenAPI document
#[derive(Parser, Debug)]
#[command(name = "openapi-from-types")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the Rust project directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Manifest with routes, entities and overrides (default: openapi-docs.yaml in the project)
    #[arg(short = 'm', long = "manifest", value_name = "FILE")]
    pub manifest: Option<PathBuf>,

    /// Load the type catalog from a JSON file instead of scanning sources
    #[arg(long = "catalog", value_name = "FILE")]
    pub catalog: Option<PathBuf>,

    /// Also write the type catalog as JSON
    #[arg(long = "dump-catalog", value_name = "FILE")]
    pub dump_catalog: Option<PathBuf>,

    /// Additional entity types to document with Create/Update variants
    #[arg(short = 'e', long = "entity", value_name = "TYPE")]
    pub entities: Vec<String>,

    /// Directory names to skip while scanning
    #[arg(long = "skip-dir", value_name = "NAME")]
    pub skip_dirs: Vec<String>,

    /// API title (overrides the manifest)
    #[arg(long = "title")]
    pub title: Option<String>,

    /// API version (overrides the manifest)
    #[arg(long = "api-version")]
    pub api_version: Option<String>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Output format options
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// YAML format
    Yaml,
    /// JSON format
    Json,
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.project_path.exists() {
        anyhow::bail!(
            "Project path does not exist: {}",
            args.project_path.display()
        );
    }

    if !args.project_path.is_dir() {
        anyhow::bail!(
            "Project path is not a directory: {}",
            args.project_path.display()
        );
    }

    info!("Project path: {}", args.project_path.display());
    info!("Output format: {:?}", args.output_format);
    if let Some(ref output) = args.output_path {
        info!("Output file: {}", output.display());
    } else {
        info!("Output: stdout");
    }

    Ok(args)
}

/// Applies command-line values over the manifest.
pub fn merge_cli_args(mut config: Config, args: &CliArgs) -> Config {
    if let Some(title) = &args.title {
        config.info.title = title.clone();
    }
    if let Some(version) = &args.api_version {
        config.info.version = version.clone();
    }
    for entity in &args.entities {
        if !config.entities.contains(entity) {
            config.entities.push(entity.clone());
        }
    }
    config
}

/// Scan, parse and resolve every Rust file under `root` into a catalog.
///
/// Files that fail to parse are skipped with a warning.
pub fn build_catalog(root: &Path, skip_dirs: &[String]) -> Result<TypeCatalog> {
    info!("Scanning project directory...");
    let scan_result = FileScanner::new(root.to_path_buf())
        .skip_dirs(skip_dirs.iter().cloned())
        .scan()?;
    info!("Found {} Rust files", scan_result.rust_files.len());

    if scan_result.rust_files.is_empty() {
        anyhow::bail!("No Rust files found in the project directory");
    }

    info!("Parsing Rust files...");
    let parsed_files: Vec<ParsedFile> = AstParser::parse_files(&scan_result.rust_files)
        .into_iter()
        .filter_map(|r| match r {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Skipping file due to parse error: {:#}", e);
                None
            }
        })
        .collect();
    info!("Successfully parsed {} files", parsed_files.len());

    if parsed_files.is_empty() {
        anyhow::bail!("No files could be parsed successfully");
    }

    Ok(TypeResolver::new(parsed_files).into_catalog())
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting OpenAPI document generation...");

    let config = ConfigManager::load(args.manifest.as_deref(), &args.project_path)?;
    let config = merge_cli_args(config, &args);

    let catalog = match &args.catalog {
        Some(path) => load_catalog(path)?,
        None => build_catalog(&args.project_path, &args.skip_dirs)?,
    };
    info!("Catalog holds {} types", catalog.len());

    if let Some(path) = &args.dump_catalog {
        write_to_file(&serialize_catalog(&catalog)?, path)?;
        info!("Wrote type catalog to {}", path.display());
    }

    if config.routes.is_empty() && config.entities.is_empty() {
        warn!("No routes or entities declared; the document will have no paths or schemas");
    }

    let routes = config.routes.len();
    let engine = DocsEngine::new(catalog, config).with_live(false);
    let build = engine.build();

    info!("Serializing to {:?} format...", args.output_format);
    let content = match args.output_format {
        OutputFormat::Yaml => serialize_yaml(&build.document)?,
        OutputFormat::Json => serialize_json(&build.document)?,
    };

    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
    } else {
        println!("{}", content);
    }

    info!("Generation complete!");
    info!("Summary:");
    info!("  - Types in catalog: {}", engine.catalog().len());
    info!("  - Routes declared: {}", routes);
    info!("  - Paths documented: {}", build.document.paths.len());
    info!(
        "  - Schemas: {}",
        build
            .document
            .components
            .as_ref()
            .map_or(0, |c| c.schemas.len())
    );
    info!("  - Degradations: {}", build.degradations.len());

    Ok(())
}
