//! OpenAPI from types - command-line tool.
//!
//! Scans a Rust project, compiles its type definitions into OpenAPI schemas
//! and assembles them with the routes and overrides of the project manifest.
//!
//! # Usage
//!
//! ```bash
//! openapi-from-types [OPTIONS] <PROJECT_PATH>
//! ```
//!
//! # Examples
//!
//! Generate YAML documentation using `openapi-docs.yaml` from the project:
//! ```bash
//! openapi-from-types ./my-api-project -o openapi.yaml
//! ```
//!
//! Generate JSON with an explicit manifest and an extra entity:
//! ```bash
//! openapi-from-types ./my-api-project -m docs.yaml -e User -f json
//! ```
//!
//! Enable verbose logging:
//! ```bash
//! openapi-from-types ./my-api-project -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use openapi_from_types::cli;

fn main() -> Result<()> {
    // Parse once up front so the verbose flag can configure the logger
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("OpenAPI from types starting...");

    let args = cli::parse_args_from_parsed(args)?;
    cli::run(args)?;

    info!("OpenAPI document generation completed successfully");

    Ok(())
}
